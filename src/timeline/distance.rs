use std::cmp::Ordering;

use thiserror::Error;

use super::ChapterTimeline;
use crate::models::ChapterId;

/// A point on the playback timeline: chapter plus offset into it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub chapter: ChapterId,
    pub offset_secs: i64,
}

impl Position {
    pub fn new(chapter: i64, offset_secs: i64) -> Self {
        Self {
            chapter: ChapterId(chapter),
            offset_secs,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DistanceError {
    #[error("chapter {0} is not part of the video")]
    ChapterNotFound(ChapterId),

    #[error("offset {offset_secs}s is outside chapter {chapter} (duration {duration_secs}s)")]
    InvalidOffset {
        chapter: ChapterId,
        offset_secs: i64,
        duration_secs: i64,
    },

    #[error("start {start:?} is after end {end:?} in playback order")]
    OutOfOrder { start: Position, end: Position },

    #[error("computed impossible distance {delta_secs}s between {start:?} and {end:?}")]
    InvariantViolation {
        start: Position,
        end: Position,
        delta_secs: i64,
    },
}

impl DistanceError {
    /// Short stable label, used for metric keys and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            DistanceError::ChapterNotFound(_) => "chapter_not_found",
            DistanceError::InvalidOffset { .. } => "invalid_offset",
            DistanceError::OutOfOrder { .. } => "out_of_order",
            DistanceError::InvariantViolation { .. } => "invariant_violation",
        }
    }
}

/// Playback seconds between `start` and `end`.
///
/// Within one chapter this is the offset difference. Across chapters it is the
/// remainder of the start chapter, every chapter strictly between the two by
/// ordinal, and the part of the end chapter up to `end`.
pub fn distance(
    timeline: &ChapterTimeline,
    start: Position,
    end: Position,
) -> Result<i64, DistanceError> {
    let start_index = timeline
        .index_of(start.chapter)
        .ok_or(DistanceError::ChapterNotFound(start.chapter))?;
    let end_index = timeline
        .index_of(end.chapter)
        .ok_or(DistanceError::ChapterNotFound(end.chapter))?;

    let start_duration = checked_offset(timeline, start_index, start)?;
    checked_offset(timeline, end_index, end)?;

    let order = start_index
        .cmp(&end_index)
        .then(start.offset_secs.cmp(&end.offset_secs));
    match order {
        Ordering::Greater => return Err(DistanceError::OutOfOrder { start, end }),
        Ordering::Equal => return Ok(0),
        Ordering::Less => {}
    }

    let delta_secs = if start_index == end_index {
        Some(end.offset_secs - start.offset_secs)
    } else {
        (start_duration - start.offset_secs)
            .checked_add(timeline.span_secs(start_index + 1, end_index))
            .and_then(|sum| sum.checked_add(end.offset_secs))
    };
    // overflow is reported as i64::MAX
    let delta_secs = delta_secs.ok_or(DistanceError::InvariantViolation {
        start,
        end,
        delta_secs: i64::MAX,
    })?;

    if delta_secs < 0 {
        return Err(DistanceError::InvariantViolation {
            start,
            end,
            delta_secs,
        });
    }

    Ok(delta_secs)
}

fn checked_offset(
    timeline: &ChapterTimeline,
    index: usize,
    position: Position,
) -> Result<i64, DistanceError> {
    let duration_secs = timeline.chapters()[index].duration_secs;
    if position.offset_secs < 0 || position.offset_secs > duration_secs {
        return Err(DistanceError::InvalidOffset {
            chapter: position.chapter,
            offset_secs: position.offset_secs,
            duration_secs,
        });
    }
    Ok(duration_secs)
}
