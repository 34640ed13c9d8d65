use std::collections::HashMap;
use std::fmt;

/// Composite bucket key built from one or more matched field values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AccumulatorKey(Vec<String>);

impl AccumulatorKey {
    pub fn new(parts: Vec<String>) -> Self {
        Self(parts)
    }

    /// Key of a family that does not split by any field.
    pub fn unit() -> Self {
        Self(Vec::new())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    pub fn is_unit(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AccumulatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl<S: Into<String>> FromIterator<S> for AccumulatorKey {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Running aggregates for one key.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccumulatorEntry {
    count: u64,
    latency_sum: f64,
    latency_samples: u64,
    last_updated: u64,
}

impl AccumulatorEntry {
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn latency_sum(&self) -> f64 {
        self.latency_sum
    }

    pub fn latency_samples(&self) -> u64 {
        self.latency_samples
    }

    /// Tick of the line that last touched this entry.
    pub fn last_updated(&self) -> u64 {
        self.last_updated
    }

    /// Mean latency over the observations that carried one.
    pub fn average_latency(&self) -> Option<f64> {
        if self.latency_samples == 0 {
            None
        } else {
            Some(self.latency_sum / self.latency_samples as f64)
        }
    }

    fn record(&mut self, observed: Option<f64>, tick: u64) {
        self.count += 1;
        if let Some(v) = observed.filter(|v| v.is_finite() && *v >= 0.0) {
            self.latency_sum += v;
            self.latency_samples += 1;
        }
        self.last_updated = tick;
    }
}

/// Open-ended key space for one metric family.
///
/// Entries live in a vector in discovery order; the map only holds slot indices.
/// Keys are never removed mid-interval, only by [`Accumulator::clear`].
#[derive(Debug, Clone, Default)]
pub struct Accumulator {
    index: HashMap<AccumulatorKey, usize>,
    slots: Vec<(AccumulatorKey, AccumulatorEntry)>,
}

impl Accumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one observation for `key`, adding `observed` to the latency sum
    /// when present. Creates the entry on first sight.
    pub fn update(&mut self, key: AccumulatorKey, observed: Option<f64>, tick: u64) {
        let slot = match self.index.get(&key) {
            Some(&i) => i,
            None => {
                let i = self.slots.len();
                self.index.insert(key.clone(), i);
                self.slots.push((key, AccumulatorEntry::default()));
                i
            }
        };
        self.slots[slot].1.record(observed, tick);
    }

    pub fn get(&self, key: &AccumulatorKey) -> Option<&AccumulatorEntry> {
        self.index.get(key).map(|&i| &self.slots[i].1)
    }

    /// Entries in key-discovery order.
    pub fn iter(&self) -> impl Iterator<Item = (&AccumulatorKey, &AccumulatorEntry)> {
        self.slots.iter().map(|(k, e)| (k, e))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
    }
}
