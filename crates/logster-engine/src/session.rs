use logster_core::Metric;
use tracing::debug;

use crate::parser::Parser;
use crate::Aggregator;

/// What happens to accumulated state once an interval is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IntervalMode {
    /// Every interval starts empty.
    #[default]
    Reset,
    /// Counts keep growing across intervals.
    Cumulative,
}

/// All parsers watching one line source.
///
/// A session is owned by a single reader; independent sources get independent
/// sessions, which share nothing and can live on separate threads.
#[derive(Debug, Clone)]
pub struct Session {
    parsers: Vec<Parser>,
    mode: IntervalMode,
    intervals: u64,
}

impl Session {
    pub fn new(parsers: Vec<Parser>, mode: IntervalMode) -> Self {
        Self {
            parsers,
            mode,
            intervals: 0,
        }
    }

    pub fn parsers(&self) -> &[Parser] {
        &self.parsers
    }

    pub fn mode(&self) -> IntervalMode {
        self.mode
    }

    /// Number of completed `finalize` calls.
    pub fn intervals(&self) -> u64 {
        self.intervals
    }

    pub fn feed<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.process_line(line.as_ref());
        }
    }
}

impl Aggregator for Session {
    fn process_line(&mut self, line: &str) {
        for p in &mut self.parsers {
            p.process_line(line);
        }
    }

    fn finalize(&mut self, duration_secs: f64) -> Vec<Metric> {
        let mut out = Vec::new();
        for p in &mut self.parsers {
            out.extend(p.metrics(duration_secs));
            if self.mode == IntervalMode::Reset {
                p.reset();
            }
        }
        self.intervals += 1;
        debug!(
            interval = self.intervals,
            mode = ?self.mode,
            metrics = out.len(),
            "session finalized"
        );
        out
    }
}
