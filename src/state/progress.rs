use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Last-known progress for one story
///
/// `highest_completed_sequence_number` only ever moves forward. The next run
/// resumes from `highest_completed_sequence_number + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub highest_completed_sequence_number: u32,
    pub last_attempted_at: DateTime<Utc>,
}

impl ProgressRecord {
    pub fn new(highest_completed_sequence_number: u32, last_attempted_at: DateTime<Utc>) -> Self {
        Self {
            highest_completed_sequence_number,
            last_attempted_at,
        }
    }

    /// The first sequence number a run should fetch for this story
    pub fn next_sequence(&self) -> u32 {
        self.highest_completed_sequence_number.saturating_add(1)
    }

    /// Returns the record advanced to `sequence_number`
    ///
    /// Never moves backwards: an older sequence number only refreshes the
    /// timestamp.
    pub fn advanced(&self, sequence_number: u32, at: DateTime<Utc>) -> Self {
        Self {
            highest_completed_sequence_number: self
                .highest_completed_sequence_number
                .max(sequence_number),
            last_attempted_at: at,
        }
    }
}
