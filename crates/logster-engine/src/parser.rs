use logster_core::{LogsterError, Metric};
use tracing::{debug, trace, warn};

use crate::classifier::{Classifier, Exclusions, Outcome};
use crate::family::{is_usable_duration, Family, FamilySpec, Normalization};
use crate::field::FieldKind;
use crate::rule::{Rule, RuleSpec};
use crate::Aggregator;

/// Declarative description of one log parser.
#[derive(Debug, Clone, Default)]
pub struct ParserSpec {
    pub name: String,
    /// Lines matching any of these patterns never reach the rules.
    pub exclude: Vec<String>,
    pub rules: Vec<RuleSpec>,
    pub families: Vec<FamilySpec>,
    /// Emit `<name>_decode_errors` when lines fail field decoding.
    pub diagnostics: bool,
}

/// Per-interval line counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserStats {
    pub lines: u64,
    pub excluded: u64,
    pub matched: u64,
    pub malformed: u64,
}

/// A classifier together with the families its rules feed.
#[derive(Debug, Clone)]
pub struct Parser {
    name: String,
    exclusions: Exclusions,
    classifier: Classifier,
    families: Vec<Family>,
    /// Family index for each rule, by rule position.
    routes: Vec<usize>,
    diagnostics: bool,
    stats: ParserStats,
    tick: u64,
}

impl Parser {
    pub fn build(spec: ParserSpec) -> Result<Self, LogsterError> {
        if spec.rules.is_empty() {
            return Err(LogsterError::configuration(&spec.name, "parser has no rules"));
        }

        let mut families = Vec::with_capacity(spec.families.len());
        for fs in spec.families {
            if families.iter().any(|f: &Family| f.name() == fs.name) {
                return Err(LogsterError::configuration(
                    &spec.name,
                    format!("duplicate family '{}'", fs.name),
                ));
            }
            families.push(Family::compile(fs)?);
        }

        let mut rules = Vec::with_capacity(spec.rules.len());
        let mut routes = Vec::with_capacity(spec.rules.len());
        for rs in spec.rules {
            let rule = Rule::compile(rs)?;
            let idx = families
                .iter()
                .position(|f| f.name() == rule.family())
                .ok_or_else(|| {
                    LogsterError::configuration(
                        rule.name(),
                        format!("unknown family '{}'", rule.family()),
                    )
                })?;
            check_route(&rule, &families[idx])?;
            routes.push(idx);
            rules.push(rule);
        }

        Ok(Self {
            name: spec.name,
            exclusions: Exclusions::new(&spec.exclude)?,
            classifier: Classifier::new(rules),
            families,
            routes,
            diagnostics: spec.diagnostics,
            stats: ParserStats::default(),
            tick: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn exclusions(&self) -> &Exclusions {
        &self.exclusions
    }

    pub fn families(&self) -> &[Family] {
        &self.families
    }

    pub fn family(&self, name: &str) -> Option<&Family> {
        self.families.iter().find(|f| f.name() == name)
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Metrics for the current interval, without resetting any state.
    pub fn metrics(&self, duration_secs: f64) -> Vec<Metric> {
        let duration = is_usable_duration(duration_secs).then_some(duration_secs);
        if duration.is_none()
            && self
                .families
                .iter()
                .any(|f| f.normalization() == Normalization::PerMinute)
        {
            warn!(
                parser = %self.name,
                duration_secs,
                "invalid interval duration, reporting raw counts for per-minute families"
            );
        }

        let mut out = Vec::new();
        for family in &self.families {
            family.metrics(duration, &mut out);
        }
        if self.diagnostics && self.stats.malformed > 0 {
            out.push(Metric::new(
                format!("{}_decode_errors", self.name),
                self.stats.malformed as f64,
                "Malformed lines per interval",
            ));
        }

        debug!(
            parser = %self.name,
            lines = self.stats.lines,
            matched = self.stats.matched,
            excluded = self.stats.excluded,
            malformed = self.stats.malformed,
            metrics = out.len(),
            "interval finalized"
        );
        out
    }

    /// Drop all accumulated entries and counters. The tick keeps advancing.
    pub fn reset(&mut self) {
        for f in &mut self.families {
            f.reset();
        }
        self.stats = ParserStats::default();
    }
}

impl Aggregator for Parser {
    fn process_line(&mut self, line: &str) {
        self.tick += 1;
        self.stats.lines += 1;

        if self.exclusions.is_excluded(line) {
            self.stats.excluded += 1;
            return;
        }

        match self.classifier.evaluate(line) {
            Outcome::Matched(c) => {
                let family = &mut self.families[self.routes[c.rule_index]];
                if family.observe(&c.fields, self.tick) {
                    self.stats.matched += 1;
                }
            }
            Outcome::Malformed { rule_index, error } => {
                self.stats.malformed += 1;
                trace!(parser = %self.name, rule = rule_index, %error, "malformed line");
            }
            Outcome::NoMatch => {}
        }
    }

    fn finalize(&mut self, duration_secs: f64) -> Vec<Metric> {
        let out = self.metrics(duration_secs);
        self.reset();
        out
    }
}

fn check_route(rule: &Rule, family: &Family) -> Result<(), LogsterError> {
    for key in family.key_fields() {
        if rule.field(key).is_none() {
            return Err(LogsterError::configuration(
                rule.name(),
                format!("family '{}' is keyed by '{key}' which the rule does not capture", family.name()),
            ));
        }
    }
    if let Some(lat) = family.latency_field() {
        if let Some(spec) = rule.field(lat) {
            if spec.kind != FieldKind::Integer {
                return Err(LogsterError::configuration(
                    rule.name(),
                    format!("latency field '{lat}' must be an integer field"),
                ));
            }
        }
    }
    Ok(())
}
