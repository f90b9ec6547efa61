//! Run summary
//!
//! Every run ends with a summary listing finished stories, skipped stories
//! with their reason codes, and the number of committed chapters.

use crate::state::{SkipReason, StoryState};
use chrono::{DateTime, Utc};
use std::fmt;

/// Terminal result of one story within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryOutcome {
    pub story_id: String,

    /// Either `Done` or `Skipped`
    pub state: StoryState,

    pub skip_reason: Option<SkipReason>,

    /// Chapters committed for this story during the run
    pub chapters_committed: u32,

    /// Progress after the run, if the story has any
    pub highest_completed: Option<u32>,
}

impl StoryOutcome {
    pub fn done(
        story_id: impl Into<String>,
        chapters_committed: u32,
        highest_completed: Option<u32>,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            state: StoryState::Done,
            skip_reason: None,
            chapters_committed,
            highest_completed,
        }
    }

    pub fn skipped(
        story_id: impl Into<String>,
        reason: SkipReason,
        chapters_committed: u32,
        highest_completed: Option<u32>,
    ) -> Self {
        Self {
            story_id: story_id.into(),
            state: StoryState::Skipped,
            skip_reason: Some(reason),
            chapters_committed,
            highest_completed,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == StoryState::Done
    }
}

/// Outcome of one bounded run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,

    /// Outcomes in processing order
    pub outcomes: Vec<StoryOutcome>,

    /// The run stopped early because of a cancellation signal
    pub cancelled: bool,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self::new()
    }
}

impl RunSummary {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            outcomes: Vec::new(),
            cancelled: false,
        }
    }

    pub fn record(&mut self, outcome: StoryOutcome) {
        self.outcomes.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Stories that left discovery, whether they finished or were skipped
    pub fn stories_touched(&self) -> usize {
        self.outcomes.len()
    }

    pub fn stories_done(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.is_done())
            .map(|o| o.story_id.as_str())
            .collect()
    }

    pub fn stories_skipped(&self) -> Vec<(&str, SkipReason)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.skip_reason.map(|reason| (o.story_id.as_str(), reason)))
            .collect()
    }

    pub fn chapters_committed(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|o| u64::from(o.chapters_committed))
            .sum()
    }

    pub fn outcome(&self, story_id: &str) -> Option<&StoryOutcome> {
        self.outcomes.iter().find(|o| o.story_id == story_id)
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let skipped = self.stories_skipped();
        writeln!(
            f,
            "Run {}: {} done, {} skipped, {} chapters committed",
            if self.cancelled { "cancelled" } else { "finished" },
            self.stories_done().len(),
            skipped.len(),
            self.chapters_committed()
        )?;
        for (story_id, reason) in skipped {
            writeln!(f, "  skipped {} ({})", story_id, reason)?;
        }
        Ok(())
    }
}
