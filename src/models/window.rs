use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::AttributionMetrics;

/// Half-open bucket `[start, end)` of the query range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Window {
    pub fn length_secs(&self) -> i64 {
        (self.end - self.start).num_seconds()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchedWindow {
    #[serde(flatten)]
    pub window: Window,
    pub watched_secs: i64,
}

/// Outcome of one attribution call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribution {
    pub windows: Vec<WatchedWindow>,
    pub total_watched_secs: i64,
    pub metrics: AttributionMetrics,
}

impl Attribution {
    pub fn zeroed(windows: &[Window], metrics: AttributionMetrics) -> Self {
        Self {
            windows: windows
                .iter()
                .map(|window| WatchedWindow {
                    window: *window,
                    watched_secs: 0,
                })
                .collect(),
            total_watched_secs: 0,
            metrics,
        }
    }
}
