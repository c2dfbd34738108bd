use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::models::VideoRef;
use crate::timeline::TimelineError;

pub type Result<T> = std::result::Result<T, AttributeError>;

/// Everything that can make an attribution call fail as a whole.
/// Per-pair data problems never surface here.
#[derive(Error, Debug)]
pub enum AttributeError {
    #[error("invalid request: {0}")]
    Input(#[from] InputError),

    #[error("upstream failure: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("video {0} has no chapters")]
    MissingChapters(VideoRef),
}

/// Rejected before any collaborator is called.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("video reference is missing")]
    MissingVideoRef,

    #[error("interval must be positive, got {secs}s")]
    NonPositiveInterval { secs: i64 },

    #[error("end {end} must be after start {start}")]
    EmptyRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("range would produce {count} windows, limit is {max}")]
    TooManyWindows { count: u64, max: u64 },
}

#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("video {0} not found")]
    VideoNotFound(VideoRef),

    #[error("metadata supplier failed: {0:#}")]
    Metadata(anyhow::Error),

    #[error("chapter list for video {video} is malformed: {source}")]
    InvalidChapters {
        video: VideoRef,
        #[source]
        source: TimelineError,
    },

    #[error("snapshot store failed: {0:#}")]
    Store(anyhow::Error),

    #[error("{operation} timed out after {after_secs}s")]
    Timeout {
        operation: &'static str,
        after_secs: u64,
    },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },
}

/// Metadata suppliers report "no such video" with this so the engine can
/// tell it apart from transport failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("video {0} not found")]
pub struct VideoNotFound(pub VideoRef);
