use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::timeline::DistanceError;

/// Data-quality counters for one attribution call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionMetrics {
    pub snapshots_fetched: u64,
    pub pairs_examined: u64,
    pub pairs_attributed: u64,
    /// Pairs with no forward progress.
    pub pairs_idle: u64,
    /// Pairs whose start snapshot fell outside the requested range.
    pub pairs_out_of_range: u64,
    /// Skipped pairs, keyed by `DistanceError::kind`.
    pub pairs_skipped: BTreeMap<String, u64>,
    pub invariant_violations: u64,
    /// Seconds of progress observed but fully or partly outside the range.
    pub seconds_dropped: i64,
}

impl AttributionMetrics {
    pub fn record_skip(&mut self, err: &DistanceError) {
        if matches!(err, DistanceError::InvariantViolation { .. }) {
            self.invariant_violations += 1;
        }
        *self.pairs_skipped.entry(err.kind().to_string()).or_insert(0) += 1;
    }

    pub fn skipped_total(&self) -> u64 {
        self.pairs_skipped.values().sum()
    }

    pub fn merge(&mut self, other: &AttributionMetrics) {
        self.snapshots_fetched += other.snapshots_fetched;
        self.pairs_examined += other.pairs_examined;
        self.pairs_attributed += other.pairs_attributed;
        self.pairs_idle += other.pairs_idle;
        self.pairs_out_of_range += other.pairs_out_of_range;
        self.invariant_violations += other.invariant_violations;
        self.seconds_dropped += other.seconds_dropped;
        for (kind, count) in &other.pairs_skipped {
            *self.pairs_skipped.entry(kind.clone()).or_insert(0) += count;
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub calls: u64,
    pub failed_calls: u64,
    pub watched_secs: i64,
    pub totals: AttributionMetrics,
}
