//! Line classification and metric accumulation.
//!
//! A [`Parser`] runs each line through an optional exclusion pre-filter and an
//! ordered [`Classifier`]; the first matching [`Rule`] routes its captured
//! fields to a [`Family`], whose [`Accumulator`] keeps per-key counts and
//! latency sums. At the end of an interval the families turn their entries into
//! [`Metric`]s. A [`Session`] drives several parsers over one line source.

pub mod accumulator;
pub mod classifier;
pub mod family;
pub mod field;
pub mod format;
pub mod parser;
pub mod rule;
pub mod session;

pub use accumulator::{Accumulator, AccumulatorEntry, AccumulatorKey};
pub use classifier::{Classification, Classifier, Exclusions, Outcome};
pub use family::{Family, FamilySpec, KeyField, Normalization};
pub use field::{FieldDecodeError, FieldKind, FieldMap, FieldSpec, FieldValue};
pub use logster_core::Metric;
pub use parser::{Parser, ParserSpec, ParserStats};
pub use rule::{Rule, RuleSpec};
pub use session::{IntervalMode, Session};

/// The two entry points a host drives: one call per line, one call per interval.
pub trait Aggregator {
    /// Account one line. Unmatched or malformed lines are silently ignored.
    fn process_line(&mut self, line: &str);

    /// Produce the interval's metrics. Never fails; an idle interval yields nothing.
    fn finalize(&mut self, duration_secs: f64) -> Vec<Metric>;
}
