pub mod presets;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use logster_core::LogsterError;
use logster_engine::{
    FamilySpec, FieldKind, FieldSpec, IntervalMode, KeyField, Normalization, Parser, ParserSpec,
    RuleSpec, Session,
};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("parser not found in config: {0}")]
    ParserNotFound(String),

    #[error("parser '{parser}': {source}")]
    Engine {
        parser: String,
        #[source]
        source: LogsterError,
    },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

// ---------------------------------------------------------------------------
// TOML data model
// ---------------------------------------------------------------------------

/// Defaults applied to every run.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Reporting interval in seconds (default: 60).
    #[serde(default = "default_interval")]
    pub interval: f64,
    /// Reset accumulators after each interval, or keep counting (default: reset).
    #[serde(default)]
    pub mode: IntervalMode,
    /// Emit `<parser>_decode_errors` metrics (default: false).
    #[serde(default)]
    pub diagnostics: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            mode: IntervalMode::default(),
            diagnostics: false,
        }
    }
}

/// Top-level TOML config file (`logster.toml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LogsterConfig {
    #[serde(default)]
    pub settings: Settings,
    /// Parser definitions, keyed by parser name.
    #[serde(default)]
    pub parsers: BTreeMap<String, ParserConfig>,
}

/// One parser: pre-filter, ordered rules and the families they feed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParserConfig {
    pub description: Option<String>,
    /// Regexes; matching lines are dropped before classification.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Rules in precedence order.
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
    #[serde(default)]
    pub families: Vec<FamilyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleConfig {
    /// Rule name used in error messages (defaults to `<parser>#<index>`).
    pub name: Option<String>,
    /// Family the rule feeds.
    pub family: String,
    pub pattern: String,
    /// Declared fields. Omitted = every named capture, as text.
    pub fields: Option<Vec<FieldConfig>>,
    #[serde(default)]
    pub case_insensitive: bool,
    /// Substrings that must all appear in the line.
    #[serde(default)]
    pub require: Vec<String>,
}

/// `"code"` or `{ name = "code", kind = "integer" }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Name(String),
    Typed(TypedField),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypedField {
    pub name: String,
    #[serde(default = "default_field_kind")]
    pub kind: FieldKind,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FamilyConfig {
    pub name: String,
    /// Metric name prefix (defaults to the family name).
    pub prefix: Option<String>,
    #[serde(default)]
    pub key: Vec<KeyFieldConfig>,
    /// Integer field carrying elapsed time.
    pub latency: Option<String>,
    /// Divisor applied to raw latency values (default: 1000, usec to msec).
    #[serde(default = "default_latency_divisor")]
    pub latency_divisor: f64,
    /// Report counts per minute instead of per interval.
    #[serde(default)]
    pub rate: bool,
    pub count_name: Option<String>,
    pub response_name: Option<String>,
    pub count_unit: Option<String>,
    pub response_unit: Option<String>,
}

/// `"code"` or `{ field = "collection", lowercase = true, ... }`.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum KeyFieldConfig {
    Name(String),
    Detailed(KeyFieldDetail),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KeyFieldDetail {
    pub field: String,
    #[serde(default)]
    pub lowercase: bool,
    /// Literal `[from, to]` substitutions, applied in order.
    #[serde(default)]
    pub replace: Vec<(String, String)>,
    pub allowed: Option<Vec<String>>,
    pub fallback: Option<String>,
}

/// CLI flags that take precedence over `[settings]`.
#[derive(Debug, Clone, Default)]
pub struct RunOverrides {
    pub interval: Option<f64>,
    pub mode: Option<IntervalMode>,
    pub diagnostics: Option<bool>,
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_interval() -> f64 {
    60.0
}
fn default_field_kind() -> FieldKind {
    FieldKind::Text
}
fn default_latency_divisor() -> f64 {
    logster_engine::family::DEFAULT_LATENCY_DIVISOR
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load and parse a TOML config file.
pub fn load(path: &Path) -> Result<LogsterConfig> {
    let content = std::fs::read_to_string(path)?;
    parse(&content)
}

/// Parse a TOML string into a LogsterConfig. Every parser is compiled, so
/// broken patterns are reported here rather than at the first interval.
pub fn parse(toml_str: &str) -> Result<LogsterConfig> {
    let config: LogsterConfig = toml::from_str(toml_str)?;
    config.validate()?;
    Ok(config)
}

/// `$XDG_CONFIG_HOME/logster/logster.toml` (or the platform equivalent).
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("logster").join("logster.toml"))
}

/// Built-in parsers, overlaid with `path` if given, else with the default
/// config file if one exists.
pub fn resolve(path: Option<&Path>) -> Result<LogsterConfig> {
    let mut config = presets::builtin()?;

    let user_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_path().filter(|p| p.exists()),
    };

    if let Some(p) = user_path {
        debug!(path = %p.display(), "loading config");
        config.merge(load(&p)?);
    }
    Ok(config)
}

/// Apply CLI overrides on top of file settings.
pub fn merge_with_cli(settings: &Settings, overrides: &RunOverrides) -> Result<Settings> {
    let merged = Settings {
        interval: overrides.interval.unwrap_or(settings.interval),
        mode: overrides.mode.unwrap_or(settings.mode),
        diagnostics: overrides.diagnostics.unwrap_or(settings.diagnostics),
    };
    validate_settings(&merged)?;
    Ok(merged)
}

impl LogsterConfig {
    pub fn get_parser(&self, name: &str) -> Option<&ParserConfig> {
        self.parsers.get(name)
    }

    /// Parser names in sorted order.
    pub fn parser_names(&self) -> Vec<&str> {
        self.parsers.keys().map(String::as_str).collect()
    }

    /// Overlay `other`: its settings win and its parsers replace same-named ones.
    pub fn merge(&mut self, other: LogsterConfig) {
        self.settings = other.settings;
        self.parsers.extend(other.parsers);
    }

    /// Engine description of a parser.
    pub fn parser_spec(&self, name: &str, diagnostics: bool) -> Result<ParserSpec> {
        let pc = self
            .get_parser(name)
            .ok_or_else(|| ConfigError::ParserNotFound(name.to_string()))?;
        Ok(to_parser_spec(name, pc, diagnostics))
    }

    pub fn build_parser(&self, name: &str, diagnostics: bool) -> Result<Parser> {
        let spec = self.parser_spec(name, diagnostics)?;
        Parser::build(spec).map_err(|source| ConfigError::Engine {
            parser: name.to_string(),
            source,
        })
    }

    /// A session running the named parsers with settings merged from `overrides`.
    pub fn build_session<S: AsRef<str>>(&self, names: &[S], overrides: &RunOverrides) -> Result<Session> {
        if names.is_empty() {
            return Err(ConfigError::Validation("at least one parser is required".into()));
        }
        let settings = merge_with_cli(&self.settings, overrides)?;
        let parsers = names
            .iter()
            .map(|n| self.build_parser(n.as_ref(), settings.diagnostics))
            .collect::<Result<Vec<_>>>()?;
        Ok(Session::new(parsers, settings.mode))
    }

    fn validate(&self) -> Result<()> {
        validate_settings(&self.settings)?;
        for (name, pc) in &self.parsers {
            validate_parser(name, pc)?;
            self.build_parser(name, false)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate_settings(settings: &Settings) -> Result<()> {
    if !logster_engine::family::is_usable_duration(settings.interval) {
        return Err(ConfigError::Validation(format!(
            "interval must be a positive number of seconds (got {})",
            settings.interval
        )));
    }
    Ok(())
}

fn validate_parser(name: &str, pc: &ParserConfig) -> Result<()> {
    if name.is_empty() {
        return Err(ConfigError::Validation("parser name must not be empty".into()));
    }
    if !name
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ConfigError::Validation(format!(
            "parser name '{}' contains invalid characters (only alphanumeric, dash, underscore allowed)",
            name
        )));
    }
    if pc.rules.is_empty() {
        return Err(ConfigError::Validation(format!(
            "parser '{}': at least one rule is required",
            name
        )));
    }
    if pc.families.is_empty() {
        return Err(ConfigError::Validation(format!(
            "parser '{}': at least one family is required",
            name
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Conversion to engine types
// ---------------------------------------------------------------------------

fn to_parser_spec(name: &str, pc: &ParserConfig, diagnostics: bool) -> ParserSpec {
    let rules = pc
        .rules
        .iter()
        .enumerate()
        .map(|(i, rc)| RuleSpec {
            name: rc.name.clone().unwrap_or_else(|| format!("{name}#{i}")),
            family: rc.family.clone(),
            pattern: rc.pattern.clone(),
            fields: rc
                .fields
                .as_ref()
                .map(|fs| fs.iter().map(FieldConfig::to_spec).collect()),
            case_insensitive: rc.case_insensitive,
            require: rc.require.clone(),
        })
        .collect();

    let families = pc.families.iter().map(FamilyConfig::to_spec).collect();

    ParserSpec {
        name: name.to_string(),
        exclude: pc.exclude.clone(),
        rules,
        families,
        diagnostics,
    }
}

impl FieldConfig {
    fn to_spec(&self) -> FieldSpec {
        match self {
            Self::Name(name) => FieldSpec::text(name),
            Self::Typed(t) => FieldSpec {
                name: t.name.clone(),
                kind: t.kind,
            },
        }
    }
}

impl KeyFieldConfig {
    fn to_key_field(&self) -> KeyField {
        match self {
            Self::Name(field) => KeyField::new(field),
            Self::Detailed(d) => {
                let mut kf = KeyField::new(&d.field);
                kf.lowercase = d.lowercase;
                kf.replace = d.replace.clone();
                kf.allowed = d.allowed.clone();
                if let Some(fb) = &d.fallback {
                    kf.fallback = fb.clone();
                }
                kf
            }
        }
    }
}

impl FamilyConfig {
    fn to_spec(&self) -> FamilySpec {
        let mut spec = FamilySpec::new(&self.name);
        if let Some(prefix) = &self.prefix {
            spec.prefix = prefix.clone();
        }
        spec.key = self.key.iter().map(KeyFieldConfig::to_key_field).collect();
        spec.latency = self.latency.clone();
        spec.latency_divisor = self.latency_divisor;
        if self.rate {
            spec.normalization = Normalization::PerMinute;
        }
        spec.count_name = self.count_name.clone();
        spec.response_name = self.response_name.clone();
        if let Some(unit) = &self.count_unit {
            spec.count_unit = unit.clone();
        }
        if let Some(unit) = &self.response_unit {
            spec.response_unit = unit.clone();
        }
        spec
    }
}
