//! Storage traits and error types
//!
//! This module defines the interface every crawl state backend implements
//! and the errors they report.

use crate::output::RunSummary;
use crate::state::ProgressRecord;
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend could not be reached or written right now
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// Persisted data for one story is malformed
    #[error("Corrupt state for story '{story_id}': {reason}")]
    CorruptState { story_id: String, reason: String },

    /// A commit would leave a hole in the committed sequence numbers
    #[error("Sequence gap for story '{story_id}': expected {expected}, got {got}")]
    SequenceGap {
        story_id: String,
        expected: u32,
        got: u32,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl StorageError {
    /// Returns true if trying the same operation again may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Io(_) | Self::Sqlite(_))
    }

    /// Returns true if the error means the story's persisted state is unusable
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::CorruptState { .. })
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Durable mapping from story id to last-known progress
///
/// The store is the only owner of persisted progress. Implementations must
/// make `commit` atomic per story: an interrupted write leaves the previously
/// committed value readable, never a partial or zero value.
#[async_trait]
pub trait CrawlStateStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Looks up the progress of a story. No side effects.
    async fn get(&self, story_id: &str) -> StorageResult<Option<ProgressRecord>>;

    /// Records `sequence_number` as completed for a story
    ///
    /// Accepts exactly the next sequence number (1 for a new story).
    /// A sequence number at or below the current one is a no-op, so the
    /// counter never moves backwards. Anything further ahead is a
    /// `SequenceGap`.
    async fn commit(
        &self,
        story_id: &str,
        sequence_number: u32,
        at: DateTime<Utc>,
    ) -> StorageResult<ProgressRecord>;

    /// Refreshes `last_attempted_at` for a story that already has progress
    async fn mark_attempted(&self, story_id: &str, at: DateTime<Utc>) -> StorageResult<()>;

    /// Lists every story with readable progress, sorted by story id
    async fn list_progress(&self) -> StorageResult<Vec<(String, ProgressRecord)>>;

    // ===== Run Bookkeeping =====

    /// Starts a run record; backends without run history return None
    async fn begin_run(&self, _config_hash: &str) -> StorageResult<Option<i64>> {
        Ok(None)
    }

    /// Closes a run record with its final status and summary
    async fn finish_run(
        &self,
        _run_id: i64,
        _status: RunStatus,
        _summary: &RunSummary,
    ) -> StorageResult<()> {
        Ok(())
    }

    /// Gets the most recent run, if the backend keeps run history
    async fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        Ok(None)
    }
}

/// Decides the outcome of a commit against the current record
///
/// Shared by every backend so the monotonic/no-gap rules live in one place.
pub(crate) fn next_progress(
    story_id: &str,
    current: Option<ProgressRecord>,
    sequence_number: u32,
    at: DateTime<Utc>,
) -> StorageResult<ProgressRecord> {
    let highest = current
        .map(|p| p.highest_completed_sequence_number)
        .unwrap_or(0);
    let expected = highest.saturating_add(1);

    if sequence_number == 0 || sequence_number > expected {
        return Err(StorageError::SequenceGap {
            story_id: story_id.to_string(),
            expected,
            got: sequence_number,
        });
    }

    Ok(match current {
        Some(record) => record.advanced(sequence_number, at),
        None => ProgressRecord::new(sequence_number, at),
    })
}
