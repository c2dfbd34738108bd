//! Playback-position snapshot data model.
//!
//! A snapshot is one poll of "where is the viewer right now": which chapter,
//! how far into it, and when the poll happened. Snapshots are append-only.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::chapter::ChapterId;
use super::video::VideoId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Store-assigned row id, `None` until persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub video_id: VideoId,
    pub chapter_id: ChapterId,
    pub offset_secs: i64,
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        video_id: VideoId,
        chapter_id: ChapterId,
        offset_secs: i64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: None,
            video_id,
            chapter_id,
            offset_secs,
            captured_at,
        }
    }
}
