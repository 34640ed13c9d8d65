use logster_core::{LogsterError, Metric};

use crate::accumulator::{Accumulator, AccumulatorKey};
use crate::field::{FieldMap, FieldValue};

pub const DEFAULT_COUNT_UNIT: &str = "Responses per minute";
pub const DEFAULT_RESPONSE_UNIT: &str = "Avg Response Time per minute";
pub const DEFAULT_LATENCY_DIVISOR: f64 = 1000.0;
pub const DEFAULT_FALLBACK: &str = "unknown";

/// Whether an interval length can be turned into a per-minute rate. Rejects
/// zero, negative, non-finite and durations so small that `d / 60` underflows.
pub fn is_usable_duration(duration_secs: f64) -> bool {
    duration_secs > 0.0 && (duration_secs / 60.0).is_normal()
}

/// How a family's counts are reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    /// Events per interval.
    #[default]
    Raw,
    /// Events per minute, derived from the interval duration.
    PerMinute,
}

/// One component of a family key and the transforms applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyField {
    pub field: String,
    pub lowercase: bool,
    pub replace: Vec<(String, String)>,
    /// When set, values outside this list collapse into `fallback`.
    pub allowed: Option<Vec<String>>,
    pub fallback: String,
}

impl KeyField {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            lowercase: false,
            replace: Vec::new(),
            allowed: None,
            fallback: DEFAULT_FALLBACK.to_string(),
        }
    }

    pub fn lowercase(mut self) -> Self {
        self.lowercase = true;
        self
    }

    pub fn replace(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.replace.push((from.into(), to.into()));
        self
    }

    pub fn allowed<S: Into<String>>(mut self, values: impl IntoIterator<Item = S>, fallback: impl Into<String>) -> Self {
        self.allowed = Some(values.into_iter().map(Into::into).collect());
        self.fallback = fallback.into();
        self
    }

    fn render(&self, value: &FieldValue) -> String {
        let mut s = value.to_string();
        for (from, to) in &self.replace {
            s = s.replace(from.as_str(), to);
        }
        if self.lowercase {
            s = s.to_lowercase();
        }
        match &self.allowed {
            Some(allowed) if !allowed.iter().any(|a| *a == s) => self.fallback.clone(),
            _ => s,
        }
    }
}

/// Declarative description of a metric family.
#[derive(Debug, Clone)]
pub struct FamilySpec {
    pub name: String,
    pub prefix: String,
    pub key: Vec<KeyField>,
    /// Integer field holding elapsed time in raw log units.
    pub latency: Option<String>,
    pub latency_divisor: f64,
    pub normalization: Normalization,
    pub count_name: Option<String>,
    pub response_name: Option<String>,
    pub count_unit: String,
    pub response_unit: String,
}

impl FamilySpec {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            prefix: name.clone(),
            name,
            key: Vec::new(),
            latency: None,
            latency_divisor: DEFAULT_LATENCY_DIVISOR,
            normalization: Normalization::Raw,
            count_name: None,
            response_name: None,
            count_unit: DEFAULT_COUNT_UNIT.to_string(),
            response_unit: DEFAULT_RESPONSE_UNIT.to_string(),
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn key(mut self, field: KeyField) -> Self {
        self.key.push(field);
        self
    }

    pub fn latency(mut self, field: impl Into<String>) -> Self {
        self.latency = Some(field.into());
        self
    }

    pub fn per_minute(mut self) -> Self {
        self.normalization = Normalization::PerMinute;
        self
    }

    pub fn count_name(mut self, template: impl Into<String>) -> Self {
        self.count_name = Some(template.into());
        self
    }

    pub fn response_name(mut self, template: impl Into<String>) -> Self {
        self.response_name = Some(template.into());
        self
    }

    pub fn count_unit(mut self, unit: impl Into<String>) -> Self {
        self.count_unit = unit.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Prefix,
    Key,
    Part(usize),
}

/// Metric name pattern such as `{prefix}_count.{code}`.
#[derive(Debug, Clone, PartialEq, Eq)]
struct NameTemplate {
    segments: Vec<Segment>,
}

impl NameTemplate {
    fn parse(family: &str, template: &str, key: &[KeyField]) -> Result<Self, LogsterError> {
        let mut segments = Vec::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            if open > 0 {
                segments.push(Segment::Literal(rest[..open].to_string()));
            }
            let after = &rest[open + 1..];
            let close = after.find('}').ok_or_else(|| {
                LogsterError::configuration(family, format!("unclosed placeholder in '{template}'"))
            })?;
            let segment = match &after[..close] {
                "prefix" => Segment::Prefix,
                "key" => Segment::Key,
                name => match key.iter().position(|k| k.field == name) {
                    Some(i) => Segment::Part(i),
                    None => {
                        return Err(LogsterError::configuration(
                            family,
                            format!("placeholder '{{{name}}}' is not a key field"),
                        ))
                    }
                },
            };
            segments.push(segment);
            rest = &after[close + 1..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self { segments })
    }

    fn render(&self, prefix: &str, key: &AccumulatorKey) -> String {
        let mut out = String::new();
        for seg in &self.segments {
            match seg {
                Segment::Literal(s) => out.push_str(s),
                Segment::Prefix => out.push_str(prefix),
                Segment::Key => out.push_str(&key.to_string()),
                Segment::Part(i) => {
                    if let Some(p) = key.parts().get(*i) {
                        out.push_str(p);
                    }
                }
            }
        }
        out
    }
}

/// A compiled family: its settings plus the accumulator for the current interval.
#[derive(Debug, Clone)]
pub struct Family {
    spec: FamilySpec,
    count_name: NameTemplate,
    response_name: NameTemplate,
    accumulator: Accumulator,
}

impl Family {
    pub fn compile(spec: FamilySpec) -> Result<Self, LogsterError> {
        if spec.name.is_empty() {
            return Err(LogsterError::configuration("<family>", "family name must not be empty"));
        }
        if !(spec.latency_divisor.is_finite() && spec.latency_divisor > 0.0) {
            return Err(LogsterError::configuration(
                &spec.name,
                "latency_divisor must be a positive number",
            ));
        }

        let (default_count, default_response) = if spec.key.is_empty() {
            ("{prefix}_count", "{prefix}_response")
        } else {
            ("{prefix}_{key}_count", "{prefix}_{key}_response")
        };
        let count_name = NameTemplate::parse(
            &spec.name,
            spec.count_name.as_deref().unwrap_or(default_count),
            &spec.key,
        )?;
        let response_name = NameTemplate::parse(
            &spec.name,
            spec.response_name.as_deref().unwrap_or(default_response),
            &spec.key,
        )?;

        Ok(Self {
            spec,
            count_name,
            response_name,
            accumulator: Accumulator::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn key_fields(&self) -> impl Iterator<Item = &str> {
        self.spec.key.iter().map(|k| k.field.as_str())
    }

    pub fn latency_field(&self) -> Option<&str> {
        self.spec.latency.as_deref()
    }

    pub fn normalization(&self) -> Normalization {
        self.spec.normalization
    }

    pub fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    /// Account one matched line. Returns false if a key field was absent
    /// (an optional group that did not participate).
    pub fn observe(&mut self, fields: &FieldMap, tick: u64) -> bool {
        let mut parts = Vec::with_capacity(self.spec.key.len());
        for kf in &self.spec.key {
            let Some(value) = fields.get(&kf.field) else {
                return false;
            };
            parts.push(kf.render(value));
        }

        let observed = self
            .spec
            .latency
            .as_deref()
            .and_then(|f| fields.get(f))
            .and_then(FieldValue::as_integer)
            .map(|raw| raw as f64 / self.spec.latency_divisor);

        self.accumulator.update(AccumulatorKey::new(parts), observed, tick);
        true
    }

    /// Derive this interval's metrics. `duration_secs` must already be validated
    /// as positive when the family is per-minute; otherwise raw counts are used.
    pub fn metrics(&self, duration_secs: Option<f64>, out: &mut Vec<Metric>) {
        for (key, entry) in self.accumulator.iter() {
            if entry.count() == 0 {
                continue;
            }

            let count = entry.count() as f64;
            let value = match (self.spec.normalization, duration_secs) {
                (Normalization::PerMinute, Some(d)) => {
                    let rate = count * 60.0 / d;
                    if rate.is_finite() {
                        rate
                    } else {
                        count
                    }
                }
                _ => count,
            };
            out.push(Metric::new(
                self.count_name.render(&self.spec.prefix, key),
                value,
                &self.spec.count_unit,
            ));

            if self.spec.latency.is_some() {
                if let Some(avg) = entry.average_latency() {
                    out.push(Metric::new(
                        self.response_name.render(&self.spec.prefix, key),
                        avg,
                        &self.spec.response_unit,
                    ));
                }
            }
        }
    }

    pub fn reset(&mut self) {
        self.accumulator.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(pairs: &[(&str, FieldValue)]) -> FieldMap {
        let mut m = FieldMap::new();
        for (k, v) in pairs {
            m.insert(*k, v.clone());
        }
        m
    }

    fn text(s: &str) -> FieldValue {
        FieldValue::Text(s.to_string())
    }

    #[test]
    fn default_names_with_key() {
        let mut f = Family::compile(FamilySpec::new("tiles").key(KeyField::new("cache")).latency("response")).unwrap();
        f.observe(&fields(&[("cache", text("os")), ("response", FieldValue::Integer(2000))]), 1);
        f.observe(&fields(&[("cache", text("os")), ("response", FieldValue::Integer(4000))]), 2);
        let mut out = Vec::new();
        f.metrics(Some(60.0), &mut out);
        assert_eq!(
            out,
            vec![
                Metric::new("tiles_os_count", 2.0, DEFAULT_COUNT_UNIT),
                Metric::new("tiles_os_response", 3.0, DEFAULT_RESPONSE_UNIT),
            ]
        );
    }

    #[test]
    fn default_names_without_key() {
        let mut f = Family::compile(FamilySpec::new("logins")).unwrap();
        f.observe(&FieldMap::new(), 1);
        let mut out = Vec::new();
        f.metrics(Some(60.0), &mut out);
        assert_eq!(out, vec![Metric::new("logins_count", 1.0, DEFAULT_COUNT_UNIT)]);
    }

    #[test]
    fn templated_names_use_key_parts() {
        let spec = FamilySpec::new("mapserver")
            .prefix("ms")
            .key(KeyField::new("collection").replace("/", "-"))
            .key(KeyField::new("code"))
            .latency("response")
            .count_name("{prefix}_{collection}_count.{code}")
            .response_name("{prefix}_{collection}_response.{code}");
        let mut f = Family::compile(spec).unwrap();
        f.observe(
            &fields(&[
                ("collection", text("os/vml")),
                ("code", FieldValue::Integer(200)),
                ("response", FieldValue::Integer(1500)),
            ]),
            1,
        );
        let mut out = Vec::new();
        f.metrics(None, &mut out);
        let names: Vec<_> = out.iter().map(|m| m.name().to_string()).collect();
        assert_eq!(names, vec!["ms_os-vml_count.200", "ms_os-vml_response.200"]);
        assert_eq!(out[1].value(), 1.5);
    }

    #[test]
    fn per_minute_rate() {
        let mut f = Family::compile(FamilySpec::new("maps").key(KeyField::new("c")).per_minute()).unwrap();
        for _ in 0..30 {
            f.observe(&fields(&[("c", text("os"))]), 0);
        }
        let mut out = Vec::new();
        f.metrics(Some(300.0), &mut out);
        assert_eq!(out[0].value(), 6.0);

        out.clear();
        f.metrics(Some(60.0), &mut out);
        assert_eq!(out[0].value(), 30.0);

        out.clear();
        f.metrics(None, &mut out);
        assert_eq!(out[0].value(), 30.0);
    }

    #[test]
    fn tiny_duration_never_yields_infinity() {
        let mut f = Family::compile(FamilySpec::new("maps").key(KeyField::new("c")).per_minute()).unwrap();
        for _ in 0..3 {
            f.observe(&fields(&[("c", text("os"))]), 0);
        }
        let mut out = Vec::new();
        f.metrics(Some(5e-324), &mut out);
        assert_eq!(out[0].value(), 3.0);

        out.clear();
        f.metrics(Some(1e-300), &mut out);
        assert!(out[0].value().is_finite());
    }

    #[test]
    fn usable_durations() {
        assert!(is_usable_duration(60.0));
        assert!(is_usable_duration(0.5));
        assert!(!is_usable_duration(0.0));
        assert!(!is_usable_duration(-60.0));
        assert!(!is_usable_duration(f64::NAN));
        assert!(!is_usable_duration(f64::INFINITY));
        assert!(!is_usable_duration(5e-324));
    }

    #[test]
    fn no_response_without_latency_samples() {
        let mut f = Family::compile(FamilySpec::new("prints").latency("response")).unwrap();
        f.observe(&FieldMap::new(), 1);
        let mut out = Vec::new();
        f.metrics(Some(60.0), &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name(), "prints_count");
    }

    #[test]
    fn allowed_values_fall_back() {
        let kf = KeyField::new("c").lowercase().allowed(["os", "geology"], "unknown");
        let mut f = Family::compile(FamilySpec::new("maps").key(kf).count_name("{key}")).unwrap();
        for c in ["OS", "geology", "moon"] {
            f.observe(&fields(&[("c", text(c))]), 0);
        }
        let mut out = Vec::new();
        f.metrics(None, &mut out);
        let names: Vec<_> = out.iter().map(|m| m.name()).collect();
        assert_eq!(names, vec!["os", "geology", "unknown"]);
    }

    #[test]
    fn missing_key_field_is_not_counted() {
        let mut f = Family::compile(FamilySpec::new("r").key(KeyField::new("host"))).unwrap();
        assert!(!f.observe(&FieldMap::new(), 0));
        assert!(f.accumulator().is_empty());
    }

    #[test]
    fn unknown_placeholder_rejected() {
        let err = Family::compile(FamilySpec::new("r").count_name("{prefix}_{host}")).unwrap_err();
        assert!(err.to_string().contains("{host}"));
    }

    #[test]
    fn unclosed_placeholder_rejected() {
        assert!(Family::compile(FamilySpec::new("r").count_name("{prefix")).is_err());
    }

    #[test]
    fn invalid_divisor_rejected() {
        let mut spec = FamilySpec::new("r");
        spec.latency_divisor = 0.0;
        assert!(Family::compile(spec).is_err());
    }

    #[test]
    fn reset_clears_entries() {
        let mut f = Family::compile(FamilySpec::new("r")).unwrap();
        f.observe(&FieldMap::new(), 0);
        f.reset();
        let mut out = Vec::new();
        f.metrics(Some(60.0), &mut out);
        assert!(out.is_empty());
    }
}
