//! Ordered, immutable view of a video's chapters.
//!
//! Chapters are kept sorted by ordinal together with a prefix sum of their
//! durations, so the playback distance between any two positions is a couple
//! of lookups regardless of chapter count.

pub mod distance;

use std::collections::HashMap;

use thiserror::Error;

use crate::models::{Chapter, ChapterId};

pub use distance::{distance, DistanceError, Position};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    #[error("chapter list is empty")]
    Empty,

    #[error("chapter {id} has negative duration {duration_secs}s")]
    NegativeDuration { id: ChapterId, duration_secs: i64 },

    #[error("chapter {id} has ordinal 0, ordinals are 1-based")]
    ZeroOrdinal { id: ChapterId },

    #[error("ordinal {ordinal} is used by more than one chapter")]
    DuplicateOrdinal { ordinal: u32 },

    #[error("chapter id {id} appears more than once")]
    DuplicateId { id: ChapterId },

    #[error("total duration overflows at chapter {id}")]
    DurationOverflow { id: ChapterId },
}

#[derive(Debug, Clone)]
pub struct ChapterTimeline {
    chapters: Vec<Chapter>,
    // starts[i] = total duration of chapters[..i]
    starts: Vec<i64>,
    index_by_id: HashMap<ChapterId, usize>,
}

impl ChapterTimeline {
    /// Validates and orders `chapters` by ordinal.
    pub fn new(mut chapters: Vec<Chapter>) -> Result<Self, TimelineError> {
        if chapters.is_empty() {
            return Err(TimelineError::Empty);
        }

        chapters.sort_by_key(|chapter| chapter.ordinal);

        let mut index_by_id = HashMap::with_capacity(chapters.len());
        let mut starts = Vec::with_capacity(chapters.len());
        let mut elapsed = 0i64;

        for (index, chapter) in chapters.iter().enumerate() {
            if chapter.ordinal == 0 {
                return Err(TimelineError::ZeroOrdinal { id: chapter.id });
            }
            if chapter.duration_secs < 0 {
                return Err(TimelineError::NegativeDuration {
                    id: chapter.id,
                    duration_secs: chapter.duration_secs,
                });
            }
            if index > 0 && chapters[index - 1].ordinal == chapter.ordinal {
                return Err(TimelineError::DuplicateOrdinal {
                    ordinal: chapter.ordinal,
                });
            }
            if index_by_id.insert(chapter.id, index).is_some() {
                return Err(TimelineError::DuplicateId { id: chapter.id });
            }

            starts.push(elapsed);
            elapsed = elapsed
                .checked_add(chapter.duration_secs)
                .ok_or(TimelineError::DurationOverflow { id: chapter.id })?;
        }

        Ok(Self {
            chapters,
            starts,
            index_by_id,
        })
    }

    pub fn chapters(&self) -> &[Chapter] {
        &self.chapters
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    /// Playback-order index of the chapter, if it is part of this timeline.
    pub fn index_of(&self, id: ChapterId) -> Option<usize> {
        self.index_by_id.get(&id).copied()
    }

    /// Sum of the durations of chapters in `from..to` (playback indices).
    pub(crate) fn span_secs(&self, from: usize, to: usize) -> i64 {
        if from >= to {
            return 0;
        }
        let end = self
            .starts
            .get(to)
            .copied()
            .unwrap_or_else(|| self.total_secs());
        end - self.starts[from]
    }

    pub fn total_secs(&self) -> i64 {
        match (self.starts.last(), self.chapters.last()) {
            (Some(start), Some(last)) => start + last.duration_secs,
            _ => 0,
        }
    }
}
