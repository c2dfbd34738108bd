use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{MetadataSupplier, SnapshotStore};
use crate::error::VideoNotFound;
use crate::models::{Snapshot, VideoId, VideoMetadata, VideoRef};

/// Fixed set of videos, e.g. loaded from a JSON file or built in tests.
#[derive(Clone, Default)]
pub struct MemoryMetadataSupplier {
    videos: Arc<RwLock<Vec<VideoMetadata>>>,
    calls: Arc<AtomicUsize>,
}

impl MemoryMetadataSupplier {
    pub fn new(videos: Vec<VideoMetadata>) -> Self {
        Self {
            videos: Arc::new(RwLock::new(videos)),
            calls: Arc::default(),
        }
    }

    pub fn insert(&self, metadata: VideoMetadata) {
        let mut guard = match self.videos.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.retain(|existing| existing.video_id != metadata.video_id);
        guard.push(metadata);
    }

    /// Number of `get_chapters` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataSupplier for MemoryMetadataSupplier {
    async fn get_chapters(&self, video: &VideoRef) -> Result<VideoMetadata> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = self
            .videos
            .read()
            .map_err(|_| anyhow!("metadata lock poisoned"))?;
        guard
            .iter()
            .find(|metadata| metadata.matches(video))
            .cloned()
            .ok_or_else(|| VideoNotFound(video.clone()).into())
    }
}

/// Append-only snapshot log held in memory.
#[derive(Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: Arc<RwLock<Vec<Snapshot>>>,
    calls: Arc<AtomicUsize>,
}

impl MemorySnapshotStore {
    pub fn new(snapshots: Vec<Snapshot>) -> Self {
        Self {
            snapshots: Arc::new(RwLock::new(snapshots)),
            calls: Arc::default(),
        }
    }

    pub fn append(&self, snapshot: Snapshot) {
        let mut guard = match self.snapshots.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(snapshot);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn query_range(
        &self,
        video: VideoId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Snapshot>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let guard = self
            .snapshots
            .read()
            .map_err(|_| anyhow!("snapshot lock poisoned"))?;
        let mut matching: Vec<Snapshot> = guard
            .iter()
            .filter(|s| s.video_id == video && s.captured_at >= from && s.captured_at <= to)
            .cloned()
            .collect();
        matching.sort_by_key(|s| s.captured_at);
        Ok(matching)
    }
}
