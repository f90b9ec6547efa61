//! Resume planner
//!
//! Pure computation of which chapter sequence numbers a story should fetch
//! in this run. No I/O; the coordinator feeds results back by stopping at
//! the first not-found chapter.

use std::ops::RangeInclusive;

/// Ordered, contiguous run of sequence numbers to fetch for one story
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterPlan {
    story_id: String,
    sequence: RangeInclusive<u32>,
}

#[allow(clippy::reversed_empty_ranges)]
const EMPTY: RangeInclusive<u32> = 1..=0;

/// Plans the next batch of chapters for a story
///
/// Starts right after `known_highest` (or at 1 for a new story) and spans
/// at most `max_chapters` sequence numbers; `None` means unbounded.
///
/// # Example
///
/// ```
/// use manga_tracker::crawler::plan;
///
/// let next = plan("one-piece", Some(3), Some(3));
/// assert_eq!(next.iter().collect::<Vec<_>>(), vec![4, 5, 6]);
/// ```
pub fn plan(story_id: &str, known_highest: Option<u32>, max_chapters: Option<u32>) -> ChapterPlan {
    let start = match known_highest {
        None => Some(1),
        Some(highest) => highest.checked_add(1),
    };

    let sequence = match (start, max_chapters) {
        (None, _) | (_, Some(0)) => EMPTY,
        (Some(start), None) => start..=u32::MAX,
        (Some(start), Some(max)) => start..=start.saturating_add(max - 1),
    };

    ChapterPlan {
        story_id: story_id.to_string(),
        sequence,
    }
}

impl ChapterPlan {
    /// Never plans past the last chapter the site advertises
    pub fn cap_at(self, latest_available: u32) -> Self {
        let start = *self.sequence.start();
        let end = (*self.sequence.end()).min(latest_available);
        let sequence = if self.is_empty() || end < start {
            EMPTY
        } else {
            start..=end
        };
        Self { sequence, ..self }
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn first(&self) -> Option<u32> {
        (!self.is_empty()).then(|| *self.sequence.start())
    }

    pub fn last(&self) -> Option<u32> {
        (!self.is_empty()).then(|| *self.sequence.end())
    }

    /// Sequence numbers in fetch order
    pub fn iter(&self) -> RangeInclusive<u32> {
        self.sequence.clone()
    }
}

impl std::fmt::Display for ChapterPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.first(), self.last()) {
            (Some(first), Some(u32::MAX)) => write!(f, "{}: chapters {}..", self.story_id, first),
            (Some(first), Some(last)) => {
                write!(f, "{}: chapters {}..={}", self.story_id, first, last)
            }
            _ => write!(f, "{}: nothing to fetch", self.story_id),
        }
    }
}
