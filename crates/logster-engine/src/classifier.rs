use logster_core::LogsterError;
use regex::RegexSet;

use crate::field::{FieldDecodeError, FieldMap};
use crate::rule::Rule;

/// A successful classification: which rule matched and what it captured.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub rule_index: usize,
    pub fields: FieldMap,
}

/// Full result of evaluating a line, including decode failures.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Matched(Classification),
    /// A rule recognised the line but one of its fields did not decode.
    Malformed {
        rule_index: usize,
        error: FieldDecodeError,
    },
    NoMatch,
}

/// Ordered rule list. Rules are tried in declaration order and the first
/// match wins; there is no scoring and no fallthrough after a match.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: Vec<Rule>,
}

impl Classifier {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn rule(&self, index: usize) -> Option<&Rule> {
        self.rules.get(index)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Evaluate a line against every rule in order.
    ///
    /// A decode failure stops evaluation: the line was recognised by that
    /// rule, so later (usually broader) rules must not claim it.
    pub fn evaluate(&self, line: &str) -> Outcome {
        for (rule_index, rule) in self.rules.iter().enumerate() {
            match rule.try_match(line) {
                Ok(Some(fields)) => return Outcome::Matched(Classification { rule_index, fields }),
                Ok(None) => continue,
                Err(error) => return Outcome::Malformed { rule_index, error },
            }
        }
        Outcome::NoMatch
    }

    /// First matching rule, treating malformed lines as unmatched.
    pub fn classify(&self, line: &str) -> Option<Classification> {
        match self.evaluate(line) {
            Outcome::Matched(c) => Some(c),
            Outcome::Malformed { .. } | Outcome::NoMatch => None,
        }
    }
}

/// Pre-filter evaluated before classification, e.g. to drop monitoring probes.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    set: Option<RegexSet>,
}

impl Exclusions {
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, LogsterError> {
        if patterns.is_empty() {
            return Ok(Self::none());
        }
        let set = RegexSet::new(patterns.iter().map(|p| p.as_ref()))
            .map_err(|e| LogsterError::configuration("exclude", format!("bad pattern: {e}")))?;
        Ok(Self { set: Some(set) })
    }

    pub fn none() -> Self {
        Self { set: None }
    }

    pub fn len(&self) -> usize {
        self.set.as_ref().map_or(0, RegexSet::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_excluded(&self, line: &str) -> bool {
        self.set.as_ref().is_some_and(|s| s.is_match(line))
    }
}
