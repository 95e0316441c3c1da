use std::collections::BTreeMap;

/// Counters and timings for pipeline work.
///
/// Uses sorted maps so snapshots list names in a stable order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Metrics {
    counters: BTreeMap<String, u64>,
    timings: BTreeMap<String, Timing>,
}

/// Aggregate of recorded durations, in milliseconds.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct Timing {
    pub count: u64,
    pub total_ms: u64,
    pub max_ms: u64,
}

impl Timing {
    pub fn record(&mut self, ms: u64) {
        self.count += 1;
        self.total_ms += ms;
        self.max_ms = self.max_ms.max(ms);
    }

    pub fn mean_ms(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.total_ms as f64 / self.count as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub counters: Vec<(String, u64)>,
    pub timings: Vec<(String, Timing)>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counter(&self, name: &str) -> u64 {
        self.counters.get(name).copied().unwrap_or(0)
    }

    pub fn inc_counter(&mut self, name: impl Into<String>, by: u64) {
        *self.counters.entry(name.into()).or_insert(0) += by;
    }

    pub fn record_ms(&mut self, name: impl Into<String>, ms: u64) {
        self.timings.entry(name.into()).or_default().record(ms);
    }

    pub fn timing(&self, name: &str) -> Option<Timing> {
        self.timings.get(name).copied()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            counters: self.counters.iter().map(|(k, v)| (k.clone(), *v)).collect(),
            timings: self.timings.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        }
    }
}
