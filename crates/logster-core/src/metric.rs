use serde::Serialize;

use crate::LogsterError;

/// A single named measurement produced at the end of a reporting interval.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Metric {
    name: String,
    value: f64,
    unit_label: String,
}

impl Metric {
    pub fn new(name: impl Into<String>, value: f64, unit: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value,
            unit_label: unit.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit_label(&self) -> &str {
        &self.unit_label
    }

    /// Copy of this metric with `prefix.` prepended to its name.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self {
            name: format!("{prefix}.{}", self.name),
            value: self.value,
            unit_label: self.unit_label.clone(),
        }
    }
}

/// Destination for finished metrics (stdout, a statistics daemon, a collector...).
///
/// Sinks shared between sessions are responsible for serialising submissions.
pub trait MetricSink {
    fn submit(&mut self, metric: &Metric) -> Result<(), LogsterError>;

    fn submit_all(&mut self, metrics: &[Metric]) -> Result<(), LogsterError> {
        for m in metrics {
            self.submit(m)?;
        }
        Ok(())
    }
}

/// In-memory sink, mostly useful in tests.
#[derive(Debug, Default)]
pub struct VecSink {
    pub metrics: Vec<Metric>,
}

impl MetricSink for VecSink {
    fn submit(&mut self, metric: &Metric) -> Result<(), LogsterError> {
        self.metrics.push(metric.clone());
        Ok(())
    }
}
