use chrono::{DateTime, Utc};
use log::{debug, error, warn};

use crate::metrics::AttributionMetrics;
use crate::models::Snapshot;
use crate::timeline::{distance, ChapterTimeline, DistanceError, Position};

/// Forward playback progress observed between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairDelta {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub delta_secs: i64,
}

/// Turns a snapshot series into per-pair deltas.
///
/// The series is stably re-sorted by capture time first; equal timestamps keep
/// store order. Pairs that cannot be measured are logged, counted in
/// `metrics` and dropped. Pairs without forward progress are dropped too.
pub fn pair_deltas(
    timeline: &ChapterTimeline,
    mut snapshots: Vec<Snapshot>,
    metrics: &mut AttributionMetrics,
) -> Vec<PairDelta> {
    snapshots.sort_by_key(|snapshot| snapshot.captured_at);

    let mut deltas = Vec::with_capacity(snapshots.len().saturating_sub(1));
    for pair in snapshots.windows(2) {
        let (current, next) = (&pair[0], &pair[1]);
        metrics.pairs_examined += 1;

        let start = position(current);
        let end = position(next);

        let delta_secs = match distance(timeline, start, end) {
            Ok(delta) => delta,
            Err(err) => {
                log_skipped(current, next, &err);
                metrics.record_skip(&err);
                continue;
            }
        };

        if delta_secs <= 0 {
            metrics.pairs_idle += 1;
            continue;
        }

        deltas.push(PairDelta {
            from: current.captured_at,
            to: next.captured_at,
            delta_secs,
        });
    }

    debug!(
        "{} of {} snapshot pairs carry forward progress",
        deltas.len(),
        metrics.pairs_examined
    );
    deltas
}

fn position(snapshot: &Snapshot) -> Position {
    Position {
        chapter: snapshot.chapter_id,
        offset_secs: snapshot.offset_secs,
    }
}

fn log_skipped(current: &Snapshot, next: &Snapshot, err: &DistanceError) {
    match err {
        DistanceError::InvariantViolation { .. } => error!(
            "invariant violation between snapshots at {} and {}: {err}",
            current.captured_at.to_rfc3339(),
            next.captured_at.to_rfc3339()
        ),
        _ => warn!(
            "skipping snapshot pair {:?} -> {:?} (at {} -> {}): {err}",
            current.id,
            next.id,
            current.captured_at.to_rfc3339(),
            next.captured_at.to_rfc3339()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Chapter, ChapterId, VideoId};
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn snap(minute: i64, chapter: i64, offset: i64) -> Snapshot {
        Snapshot::new(VideoId(1), ChapterId(chapter), offset, at(minute))
    }

    fn timeline() -> ChapterTimeline {
        ChapterTimeline::new(vec![Chapter::new(1, 1, 600), Chapter::new(2, 2, 300)]).unwrap()
    }

    #[test]
    fn measures_consecutive_pairs() {
        let mut metrics = AttributionMetrics::default();
        let deltas = pair_deltas(
            &timeline(),
            vec![snap(0, 1, 0), snap(5, 1, 300), snap(10, 2, 10)],
            &mut metrics,
        );
        let secs: Vec<i64> = deltas.iter().map(|d| d.delta_secs).collect();
        assert_eq!(secs, vec![300, 310]);
        assert_eq!(deltas[1].from, at(5));
        assert_eq!(deltas[1].to, at(10));
        assert_eq!(metrics.pairs_examined, 2);
    }

    #[test]
    fn unknown_chapter_skips_only_its_pairs() {
        let mut metrics = AttributionMetrics::default();
        let deltas = pair_deltas(
            &timeline(),
            vec![snap(0, 1, 0), snap(5, 1, 120), snap(10, 77, 5), snap(15, 1, 400), snap(20, 1, 460)],
            &mut metrics,
        );
        let secs: Vec<i64> = deltas.iter().map(|d| d.delta_secs).collect();
        assert_eq!(secs, vec![120, 60]);
        assert_eq!(metrics.pairs_skipped.get("chapter_not_found"), Some(&2));
        assert_eq!(metrics.skipped_total(), 2);
    }

    #[test]
    fn rewinds_and_invalid_offsets_are_counted() {
        let mut metrics = AttributionMetrics::default();
        let deltas = pair_deltas(
            &timeline(),
            vec![snap(0, 1, 300), snap(5, 1, 100), snap(10, 1, 9000), snap(15, 1, 200)],
            &mut metrics,
        );
        assert!(deltas.is_empty());
        assert_eq!(metrics.pairs_skipped.get("out_of_order"), Some(&1));
        assert_eq!(metrics.pairs_skipped.get("invalid_offset"), Some(&2));
        assert_eq!(metrics.invariant_violations, 0);
    }

    #[test]
    fn unsorted_input_is_reordered_by_capture_time() {
        let mut metrics = AttributionMetrics::default();
        let deltas = pair_deltas(
            &timeline(),
            vec![snap(10, 1, 200), snap(0, 1, 0), snap(5, 1, 100)],
            &mut metrics,
        );
        let secs: Vec<i64> = deltas.iter().map(|d| d.delta_secs).collect();
        assert_eq!(secs, vec![100, 100]);
        assert_eq!(metrics.skipped_total(), 0);
    }

    #[test]
    fn duplicate_polls_are_idle_pairs() {
        let mut metrics = AttributionMetrics::default();
        let deltas = pair_deltas(
            &timeline(),
            vec![snap(0, 1, 50), snap(0, 1, 50), snap(5, 1, 50)],
            &mut metrics,
        );
        assert!(deltas.is_empty());
        assert_eq!(metrics.pairs_idle, 2);
    }
}
