mod types;

pub use types::{AttributionMetrics, MetricsSnapshot};

use std::sync::Arc;

use log::warn;
use tokio::sync::Mutex;

/// Aggregates attribution outcomes across calls.
///
/// Lives outside the engine: callers that fan out over several videos record
/// each result here and read one snapshot at the end.
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsSnapshot>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsSnapshot::default())),
        }
    }

    pub async fn record_success(&self, watched_secs: i64, metrics: &AttributionMetrics) {
        let mut state = self.inner.lock().await;
        state.calls += 1;
        state.watched_secs += watched_secs;
        state.totals.merge(metrics);

        if metrics.invariant_violations > 0 {
            warn!(
                "{} invariant violations recorded so far ({} in latest call)",
                state.totals.invariant_violations, metrics.invariant_violations
            );
        }
    }

    pub async fn record_failure(&self) {
        let mut state = self.inner.lock().await;
        state.calls += 1;
        state.failed_calls += 1;
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        self.inner.lock().await.clone()
    }

    pub async fn reset(&self) {
        let mut state = self.inner.lock().await;
        *state = MetricsSnapshot::default();
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
