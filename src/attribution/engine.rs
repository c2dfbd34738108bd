use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use log::{info, warn};

use super::config::AttributionConfig;
use super::deltas::pair_deltas;
use super::policy::apply_policy;
use super::windows::WindowPlan;
use crate::context::CallContext;
use crate::error::{AttributeError, InputError, Result, UpstreamError, VideoNotFound};
use crate::metrics::AttributionMetrics;
use crate::models::{Attribution, Snapshot, VideoId, VideoRef, WatchedWindow};
use crate::sources::{MetadataSupplier, SnapshotStore};
use crate::timeline::ChapterTimeline;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRequest {
    pub video: VideoRef,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub interval: Duration,
}

impl AttributeRequest {
    pub fn new(video: VideoRef, start: DateTime<Utc>, end: DateTime<Utc>, interval: Duration) -> Self {
        Self {
            video,
            start,
            end,
            interval,
        }
    }

    /// Checks everything that can be checked without I/O.
    pub fn plan(&self, config: &AttributionConfig) -> std::result::Result<WindowPlan, InputError> {
        if self.video.is_empty() {
            return Err(InputError::MissingVideoRef);
        }
        WindowPlan::new(self.start, self.end, self.interval, config.max_windows)
    }
}

/// Buckets watched time for one video at a time.
///
/// Holds only read-only collaborators and configuration, so a single engine
/// can be shared between concurrent calls.
#[derive(Clone)]
pub struct AttributionEngine {
    metadata: Arc<dyn MetadataSupplier>,
    store: Arc<dyn SnapshotStore>,
    config: AttributionConfig,
}

impl AttributionEngine {
    pub fn new(
        metadata: Arc<dyn MetadataSupplier>,
        store: Arc<dyn SnapshotStore>,
        config: AttributionConfig,
    ) -> Self {
        Self {
            metadata,
            store,
            config,
        }
    }

    pub fn config(&self) -> &AttributionConfig {
        &self.config
    }

    pub async fn attribute(&self, request: &AttributeRequest, ctx: &CallContext) -> Result<Attribution> {
        let plan = request.plan(&self.config)?;

        let (video_id, timeline) = self.load_timeline(&request.video, ctx).await?;

        let snapshots = self.fetch_range(video_id, &plan, ctx).await?;
        let attribution = attribute_snapshots(&timeline, snapshots, &plan, &self.config);

        info!(
            "video {} [{}, {}) every {}s: {} windows, {}s watched, {} pairs skipped",
            request.video,
            plan.start().to_rfc3339(),
            plan.end().to_rfc3339(),
            plan.interval().num_seconds(),
            attribution.windows.len(),
            attribution.total_watched_secs,
            attribution.metrics.skipped_total()
        );
        Ok(attribution)
    }

    async fn load_timeline(
        &self,
        video: &VideoRef,
        ctx: &CallContext,
    ) -> Result<(VideoId, ChapterTimeline)> {
        let metadata = ctx
            .run("metadata fetch", self.metadata.get_chapters(video))
            .await?
            .map_err(|err| match err.downcast::<VideoNotFound>() {
                Ok(VideoNotFound(missing)) => UpstreamError::VideoNotFound(missing),
                Err(other) => UpstreamError::Metadata(other),
            })?;

        if metadata.chapters.is_empty() {
            return Err(AttributeError::MissingChapters(video.clone()));
        }

        let timeline =
            ChapterTimeline::new(metadata.chapters).map_err(|source| UpstreamError::InvalidChapters {
                video: video.clone(),
                source,
            })?;
        Ok((metadata.video_id, timeline))
    }

    /// Broad stage: every snapshot that could contribute to the plan, including
    /// the surrounding intervals.
    pub async fn fetch_range(
        &self,
        video_id: VideoId,
        plan: &WindowPlan,
        ctx: &CallContext,
    ) -> Result<Vec<Snapshot>> {
        let (from, to) = plan.fetch_range(
            self.config.lookbehind_intervals,
            self.config.lookahead_intervals,
        );
        info!(
            "querying snapshots of {} in [{}, {}]",
            video_id,
            from.to_rfc3339(),
            to.to_rfc3339()
        );

        let snapshots = ctx
            .run("snapshot query", self.store.query_range(video_id, from, to))
            .await?
            .map_err(UpstreamError::Store)?;

        if let Some(foreign) = snapshots.iter().find(|s| s.video_id != video_id) {
            warn!(
                "snapshot store returned a snapshot of {} for {}; ignoring it",
                foreign.video_id, video_id
            );
        }
        Ok(snapshots
            .into_iter()
            .filter(|s| s.video_id == video_id)
            .collect())
    }
}

/// Narrow stage: measure every pair and credit the deltas to windows.
pub fn attribute_snapshots(
    timeline: &ChapterTimeline,
    snapshots: Vec<Snapshot>,
    plan: &WindowPlan,
    config: &AttributionConfig,
) -> Attribution {
    let mut metrics = AttributionMetrics {
        snapshots_fetched: snapshots.len() as u64,
        ..Default::default()
    };

    if snapshots.len() < 2 {
        info!(
            "{} snapshot(s) around [{}, {}), nothing to measure",
            snapshots.len(),
            plan.start().to_rfc3339(),
            plan.end().to_rfc3339()
        );
        return Attribution::zeroed(plan.windows(), metrics);
    }

    let deltas = pair_deltas(timeline, snapshots, &mut metrics);
    let accumulators = apply_policy(plan, &deltas, config.policy, &mut metrics);

    let windows: Vec<WatchedWindow> = plan
        .windows()
        .iter()
        .zip(accumulators)
        .map(|(window, watched_secs)| WatchedWindow {
            window: *window,
            watched_secs,
        })
        .collect();
    let total_watched_secs = windows.iter().map(|w| w.watched_secs).sum();

    Attribution {
        windows,
        total_watched_secs,
        metrics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::AttributionPolicy;
    use crate::models::{Chapter, ChapterId, VideoMetadata};
    use crate::sources::{MemoryMetadataSupplier, MemorySnapshotStore};
    use chrono::TimeZone;

    const VIDEO: VideoId = VideoId(114);

    fn t(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn snap(minute: i64, chapter: i64, offset: i64) -> Snapshot {
        Snapshot::new(VIDEO, ChapterId(chapter), offset, t(minute))
    }

    fn metadata(chapters: Vec<Chapter>) -> VideoMetadata {
        VideoMetadata {
            video_id: VIDEO,
            bvid: Some("BV114".into()),
            title: "lecture".into(),
            chapters,
        }
    }

    fn engine(
        chapters: Vec<Chapter>,
        snapshots: Vec<Snapshot>,
    ) -> (AttributionEngine, MemoryMetadataSupplier, MemorySnapshotStore) {
        let supplier = MemoryMetadataSupplier::new(vec![metadata(chapters)]);
        let store = MemorySnapshotStore::new(snapshots);
        let engine = AttributionEngine::new(
            Arc::new(supplier.clone()),
            Arc::new(store.clone()),
            AttributionConfig::default(),
        );
        (engine, supplier, store)
    }

    fn request(start: i64, end: i64, interval_minutes: i64) -> AttributeRequest {
        AttributeRequest::new(
            VideoRef::aid(VIDEO.0),
            t(start),
            t(end),
            Duration::minutes(interval_minutes),
        )
    }

    fn watched(attribution: &Attribution) -> Vec<i64> {
        attribution.windows.iter().map(|w| w.watched_secs).collect()
    }

    #[tokio::test]
    async fn five_minutes_of_watching_lands_in_first_window() {
        let (engine, _, _) = engine(
            vec![Chapter::new(1, 1, 600), Chapter::new(2, 2, 300)],
            vec![snap(0, 1, 0), snap(5, 1, 300)],
        );
        let result = engine
            .attribute(&request(0, 10, 5), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(watched(&result), vec![300, 0]);
        assert_eq!(result.total_watched_secs, 300);
        assert_eq!(result.windows[1].window.end, t(10));
    }

    #[tokio::test]
    async fn pair_started_before_range_is_dropped_but_fetched() {
        let (engine, _, store) = engine(
            vec![Chapter::new(1, 1, 3600)],
            vec![snap(-15, 1, 0), snap(-5, 1, 600), snap(5, 1, 1200), snap(15, 1, 1500)],
        );
        let result = engine
            .attribute(&request(0, 20, 10), &CallContext::default())
            .await
            .unwrap();
        // -15 -> -5 and the -5 -> 5 pair begin before the range
        assert_eq!(watched(&result), vec![300, 0]);
        assert_eq!(result.metrics.snapshots_fetched, 4);
        assert_eq!(result.metrics.pairs_out_of_range, 2);
        assert_eq!(store.calls(), 1);
    }

    #[tokio::test]
    async fn last_window_uses_snapshot_after_range_end() {
        let (engine, _, _) = engine(
            vec![Chapter::new(1, 1, 3600)],
            vec![snap(0, 1, 0), snap(18, 1, 60), snap(25, 1, 480)],
        );
        let result = engine
            .attribute(&request(0, 20, 10), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(watched(&result), vec![60, 420]);
        assert_eq!(result.total_watched_secs, 480);
    }

    #[tokio::test]
    async fn single_snapshot_yields_zero_windows() {
        let (engine, _, _) = engine(vec![Chapter::new(1, 1, 600)], vec![snap(3, 1, 10)]);
        let result = engine
            .attribute(&request(0, 30, 10), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(watched(&result), vec![0, 0, 0]);
        assert_eq!(result.total_watched_secs, 0);
    }

    #[tokio::test]
    async fn stale_chapter_ids_do_not_abort() {
        let (engine, _, _) = engine(
            vec![Chapter::new(1, 1, 600)],
            vec![snap(0, 1, 0), snap(2, 1, 120), snap(4, 99, 30), snap(6, 1, 300), snap(8, 1, 420)],
        );
        let result = engine
            .attribute(&request(0, 10, 5), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(watched(&result), vec![120, 120]);
        assert_eq!(result.metrics.pairs_skipped.get("chapter_not_found"), Some(&2));
    }

    #[tokio::test]
    async fn input_errors_skip_collaborators() {
        let (engine, supplier, store) = engine(vec![Chapter::new(1, 1, 600)], vec![]);

        let zero = engine
            .attribute(&request(0, 10, 0), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            zero,
            AttributeError::Input(InputError::NonPositiveInterval { secs: 0 })
        ));

        let backwards = engine
            .attribute(&request(10, 0, 5), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(backwards, AttributeError::Input(InputError::EmptyRange { .. })));

        let mut missing = request(0, 10, 5);
        missing.video = VideoRef::bvid("  ");
        let missing = engine
            .attribute(&missing, &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(missing, AttributeError::Input(InputError::MissingVideoRef)));

        assert_eq!(supplier.calls(), 0);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn empty_chapter_list_is_missing_chapters() {
        let (engine, _, store) = engine(Vec::new(), vec![snap(0, 1, 0), snap(1, 1, 60)]);
        let err = engine
            .attribute(&request(0, 10, 5), &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AttributeError::MissingChapters(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn unknown_video_is_upstream_not_found() {
        let (engine, _, _) = engine(vec![Chapter::new(1, 1, 600)], vec![]);
        let mut other = request(0, 10, 5);
        other.video = VideoRef::aid(5);
        let err = engine
            .attribute(&other, &CallContext::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AttributeError::Upstream(UpstreamError::VideoNotFound(VideoRef::Aid(VideoId(5))))
        ));
    }

    struct UnfilteredStore(Vec<Snapshot>);

    #[async_trait::async_trait]
    impl SnapshotStore for UnfilteredStore {
        async fn query_range(
            &self,
            _video: VideoId,
            _from: DateTime<Utc>,
            _to: DateTime<Utc>,
        ) -> anyhow::Result<Vec<Snapshot>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn snapshots_of_other_videos_are_ignored() {
        let supplier = MemoryMetadataSupplier::new(vec![metadata(vec![Chapter::new(1, 1, 600)])]);
        let store = UnfilteredStore(vec![
            snap(0, 1, 0),
            Snapshot::new(VideoId(999), ChapterId(1), 500, t(2)),
            snap(5, 1, 300),
        ]);
        let engine = AttributionEngine::new(
            Arc::new(supplier),
            Arc::new(store),
            AttributionConfig::default(),
        );

        let result = engine
            .attribute(&request(0, 10, 5), &CallContext::default())
            .await
            .unwrap();
        assert_eq!(watched(&result), vec![300, 0]);
        assert_eq!(result.metrics.snapshots_fetched, 2);
        assert_eq!(result.metrics.skipped_total(), 0);
    }

    #[tokio::test]
    async fn cancelled_context_aborts_the_call() {
        let (engine, _, _) = engine(vec![Chapter::new(1, 1, 600)], vec![]);
        let ctx = CallContext::default();
        ctx.cancel_token().cancel();
        let err = engine.attribute(&request(0, 10, 5), &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            AttributeError::Upstream(UpstreamError::Cancelled { .. })
        ));
    }

    #[test]
    fn window_sum_always_matches_total() {
        let timeline = ChapterTimeline::new(vec![
            Chapter::new(1, 1, 500),
            Chapter::new(2, 2, 700),
            Chapter::new(3, 3, 400),
        ])
        .unwrap();
        let snapshots = vec![
            snap(-30, 1, 0),
            snap(-3, 1, 100),
            snap(4, 1, 480),
            snap(9, 2, 100),
            snap(9, 2, 100),
            snap(13, 1, 20),
            snap(21, 2, 650),
            snap(33, 3, 10),
            snap(47, 3, 390),
            snap(61, 3, 400),
        ];
        for policy in [AttributionPolicy::StartWindow, AttributionPolicy::Proportional] {
            for interval in [1, 4, 7, 10, 60] {
                let plan = WindowPlan::new(t(0), t(50), Duration::minutes(interval), 1000).unwrap();
                let config = AttributionConfig {
                    policy,
                    ..Default::default()
                };
                let result = attribute_snapshots(&timeline, snapshots.clone(), &plan, &config);
                let sum: i64 = watched(&result).iter().sum();
                assert_eq!(sum, result.total_watched_secs, "{policy:?} / {interval}m");
                assert_eq!(result.windows.len(), plan.len());
            }
        }
    }
}
