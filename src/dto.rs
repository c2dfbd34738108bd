//! JSON documents printed by the command line.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::metrics::{AttributionMetrics, MetricsSnapshot};
use crate::models::{Attribution, VideoRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowDto {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub watched_seconds: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionResponse {
    pub windows: Vec<WindowDto>,
    pub total_watched_seconds: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<AttributionMetrics>,
}

impl AttributionResponse {
    pub fn with_metrics(mut self, metrics: AttributionMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }
}

impl From<&Attribution> for AttributionResponse {
    fn from(attribution: &Attribution) -> Self {
        Self {
            windows: attribution
                .windows
                .iter()
                .map(|watched| WindowDto {
                    start: watched.window.start,
                    end: watched.window.end,
                    watched_seconds: watched.watched_secs,
                })
                .collect(),
            total_watched_seconds: attribution.total_watched_secs,
            metrics: None,
        }
    }
}

/// Per-video line of a batch report; exactly one of `result`/`error` is set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportEntry {
    pub video: VideoRef,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<AttributionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    pub fn success(video: VideoRef, result: AttributionResponse) -> Self {
        Self {
            video,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(video: VideoRef, error: impl Into<String>) -> Self {
        Self {
            video,
            result: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocument {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: String,
    pub videos: Vec<ReportEntry>,
    pub metrics: MetricsSnapshot,
}
