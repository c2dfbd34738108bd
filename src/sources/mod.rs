//! Collaborators the attribution engine reads from.
//!
//! Both are read-only and idempotent from the engine's point of view, so one
//! instance can serve any number of concurrent calls.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{Snapshot, VideoId, VideoMetadata, VideoRef};

pub use memory::{MemoryMetadataSupplier, MemorySnapshotStore};

/// Resolves a video reference to its canonical id and ordered chapter list.
///
/// Implementations signal an unknown video by returning an error that
/// downcasts to [`crate::error::VideoNotFound`]; anything else is treated as
/// an upstream failure.
#[async_trait]
pub trait MetadataSupplier: Send + Sync {
    async fn get_chapters(&self, video: &VideoRef) -> Result<VideoMetadata>;
}

/// Range queries over persisted snapshots.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    /// Snapshots of `video` captured within `[from, to]`, ascending by
    /// capture time.
    async fn query_range(
        &self,
        video: VideoId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>>;
}
