use logster_core::LogsterError;
use regex::{Regex, RegexBuilder, RegexSet, RegexSetBuilder};

use crate::field::{self, FieldDecodeError, FieldMap, FieldSpec};

/// Declarative description of a rule, before compilation.
#[derive(Debug, Clone)]
pub struct RuleSpec {
    pub name: String,
    /// Family that matching lines are accounted to.
    pub family: String,
    pub pattern: String,
    /// Declared fields. `None` takes every named capture as text.
    pub fields: Option<Vec<FieldSpec>>,
    pub case_insensitive: bool,
    /// Substrings that must all be present for the rule to apply.
    pub require: Vec<String>,
}

impl RuleSpec {
    pub fn new(name: impl Into<String>, family: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            family: family.into(),
            pattern: pattern.into(),
            fields: None,
            case_insensitive: false,
            require: Vec::new(),
        }
    }

    pub fn fields(mut self, fields: Vec<FieldSpec>) -> Self {
        self.fields = Some(fields);
        self
    }

    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }

    pub fn require(mut self, needle: impl Into<String>) -> Self {
        self.require.push(needle.into());
        self
    }
}

/// A compiled field extractor: one recognised line shape and the fields it yields.
#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    family: String,
    pattern: Regex,
    fields: Vec<FieldSpec>,
    /// Escaped `require` literals; every one must match.
    guards: Option<RegexSet>,
}

impl Rule {
    pub fn compile(spec: RuleSpec) -> Result<Self, LogsterError> {
        let pattern = RegexBuilder::new(&spec.pattern)
            .case_insensitive(spec.case_insensitive)
            .build()
            .map_err(|e| LogsterError::configuration(&spec.name, format!("bad pattern: {e}")))?;

        let captures: Vec<&str> = pattern.capture_names().flatten().collect();

        let fields = match spec.fields {
            Some(fields) => {
                for f in &fields {
                    if !captures.contains(&f.name.as_str()) {
                        return Err(LogsterError::configuration(
                            &spec.name,
                            format!("field '{}' is not a named capture of the pattern", f.name),
                        ));
                    }
                }
                fields
            }
            None => captures.iter().map(|c| FieldSpec::text(*c)).collect(),
        };

        let guards = if spec.require.is_empty() {
            None
        } else {
            let set = RegexSetBuilder::new(spec.require.iter().map(|r| regex::escape(r)))
                .case_insensitive(spec.case_insensitive)
                .build()
                .map_err(|e| LogsterError::configuration(&spec.name, format!("bad require guard: {e}")))?;
            Some(set)
        };

        Ok(Self {
            name: spec.name,
            family: spec.family,
            pattern,
            fields,
            guards,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn family(&self) -> &str {
        &self.family
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Match a line. `Ok(None)` when the shape is not recognised, `Err` when it is
    /// recognised but a field does not decode.
    pub fn try_match(&self, line: &str) -> Result<Option<FieldMap>, FieldDecodeError> {
        if !self.guards_pass(line) {
            return Ok(None);
        }

        let Some(caps) = self.pattern.captures(line) else {
            return Ok(None);
        };

        let mut map = FieldMap::new();
        for spec in &self.fields {
            // Optional groups that did not participate are simply absent.
            if let Some(m) = caps.name(&spec.name) {
                map.insert(spec.name.clone(), field::decode(spec, m.as_str())?);
            }
        }
        Ok(Some(map))
    }

    fn guards_pass(&self, line: &str) -> bool {
        match &self.guards {
            Some(set) => set.matches(line).matched_all(),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldValue;

    const EDIAUTH: &str =
        r#"10.0.0.1 - - [01/Jan/2014:10:00:00 +0000] "GET /cgi-bin/getSession?x=1 HTTP/1.1" 200 512 "-" "curl""#;

    fn ediauth_rule() -> Rule {
        Rule::compile(
            RuleSpec::new("login", "ediauth", r#"GET /cgi-bin/getSession.* HTTP/\d.\d" (?P<code>\d+) "#)
                .fields(vec![FieldSpec::integer("code")]),
        )
        .unwrap()
    }

    #[test]
    fn matches_amid_noise() {
        let fields = ediauth_rule().try_match(EDIAUTH).unwrap().unwrap();
        assert_eq!(fields.get("code"), Some(&FieldValue::Integer(200)));
    }

    #[test]
    fn unrelated_line_is_none() {
        let r = ediauth_rule();
        assert!(r.try_match("GET /favicon.ico HTTP/1.1\" 404 0").unwrap().is_none());
    }

    #[test]
    fn bad_integer_is_decode_error() {
        let r = Rule::compile(
            RuleSpec::new("resp", "tiles", r"Response: (?P<response>\S+)")
                .fields(vec![FieldSpec::integer("response")]),
        )
        .unwrap();
        let err = r.try_match("GET /tile Response: fast").unwrap_err();
        assert_eq!(err.field, "response");
    }

    #[test]
    fn unknown_field_is_configuration_error() {
        let err = Rule::compile(
            RuleSpec::new("broken", "f", r"(?P<code>\d+)").fields(vec![FieldSpec::text("host")]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("field 'host'"));
        assert!(err.to_string().contains("broken"));
    }

    #[test]
    fn bad_pattern_is_configuration_error() {
        let err = Rule::compile(RuleSpec::new("broken", "f", r"(?P<code>\d+")).unwrap_err();
        assert!(matches!(err, LogsterError::Configuration { .. }));
    }

    #[test]
    fn omitted_fields_default_to_all_captures() {
        let r = Rule::compile(RuleSpec::new("host", "req", r"(?P<host>dm-\S+) .* (?P<code>\d+)")).unwrap();
        let names: Vec<_> = r.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["host", "code"]);
        let m = r.try_match("x dm-web01 GET / 500").unwrap().unwrap();
        assert_eq!(m.get("code"), Some(&FieldValue::Text("500".into())));
    }

    #[test]
    fn require_guard() {
        let r = Rule::compile(
            RuleSpec::new("tiled", "mp", r"/mapproxy/service.*layers=(?P<cache>[\w-]+)")
                .case_insensitive()
                .require("tiled=true"),
        )
        .unwrap();
        assert!(r
            .try_match("GET /mapproxy/service?TILED=TRUE&layers=os")
            .unwrap()
            .is_some());
        assert!(r.try_match("GET /mapproxy/service?layers=os").unwrap().is_none());
    }

    #[test]
    fn require_guards_are_literal_and_all_required() {
        let r = Rule::compile(
            RuleSpec::new("print", "prints", r"GET /(?P<app>\w+)/")
                .require("print=1")
                .require("a.b"),
        )
        .unwrap();
        assert!(r.try_match("GET /clive/x?print=1&a.b").unwrap().is_some());
        assert!(r.try_match("GET /clive/x?print=1&axb").unwrap().is_none());
        assert!(r.try_match("GET /clive/x?a.b").unwrap().is_none());
        assert!(r.try_match("GET /clive/x?PRINT=1&a.b").unwrap().is_none());
    }

    #[test]
    fn repeated_match_is_identical() {
        let r = ediauth_rule();
        assert_eq!(r.try_match(EDIAUTH).unwrap(), r.try_match(EDIAUTH).unwrap());
    }
}
