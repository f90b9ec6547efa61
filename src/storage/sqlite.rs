//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the CrawlStateStore trait.

use crate::output::RunSummary;
use crate::state::ProgressRecord;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{next_progress, CrawlStateStore, StorageError, StorageResult};
use crate::storage::{RunRecord, RunStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite state backend
///
/// Every commit runs in its own transaction, so a crash mid-commit rolls
/// back to the previous counter.
pub struct SqliteStateStore {
    conn: Mutex<Connection>,
}

impl SqliteStateStore {
    /// Opens or creates the database at `path`
    pub fn new(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| StorageError::Unavailable(format!("{}: {}", path.display(), e)))?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StorageError::Unavailable("state connection lock poisoned".to_string()))
    }
}

/// Reads one progress row, rejecting values no commit could have written
fn read_progress(
    conn: &Connection,
    story_id: &str,
) -> StorageResult<Option<ProgressRecord>> {
    let row: Option<(Value, Value)> = conn
        .query_row(
            "SELECT highest_completed, last_attempted_at FROM story_progress WHERE story_id = ?1",
            params![story_id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    match row {
        Some((highest, attempted)) => decode_progress(story_id, highest, attempted).map(Some),
        None => Ok(None),
    }
}

fn decode_progress(story_id: &str, highest: Value, attempted: Value) -> StorageResult<ProgressRecord> {
    let corrupt = |reason: String| StorageError::CorruptState {
        story_id: story_id.to_string(),
        reason,
    };

    let highest = match highest {
        Value::Integer(n) if n >= 1 && n <= i64::from(u32::MAX) => n as u32,
        other => {
            return Err(corrupt(format!(
                "highest_completed is not a positive sequence number: {:?}",
                other
            )))
        }
    };

    let attempted = match attempted {
        Value::Text(text) => DateTime::parse_from_rfc3339(&text)
            .map_err(|e| corrupt(format!("last_attempted_at '{}': {}", text, e)))?
            .with_timezone(&Utc),
        other => {
            return Err(corrupt(format!(
                "last_attempted_at is not a timestamp: {:?}",
                other
            )))
        }
    };

    Ok(ProgressRecord::new(highest, attempted))
}

#[async_trait]
impl CrawlStateStore for SqliteStateStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn get(&self, story_id: &str) -> StorageResult<Option<ProgressRecord>> {
        let conn = self.lock()?;
        read_progress(&conn, story_id)
    }

    async fn commit(
        &self,
        story_id: &str,
        sequence_number: u32,
        at: DateTime<Utc>,
    ) -> StorageResult<ProgressRecord> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        let current = read_progress(&tx, story_id)?;
        let next = next_progress(story_id, current, sequence_number, at)?;

        if Some(next) != current {
            tx.execute(
                "INSERT INTO story_progress (story_id, highest_completed, last_attempted_at, created_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(story_id) DO UPDATE SET
                    highest_completed = excluded.highest_completed,
                    last_attempted_at = excluded.last_attempted_at",
                params![
                    story_id,
                    next.highest_completed_sequence_number,
                    next.last_attempted_at.to_rfc3339()
                ],
            )?;
        }

        tx.commit()?;
        Ok(next)
    }

    async fn mark_attempted(&self, story_id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE story_progress SET last_attempted_at = ?1 WHERE story_id = ?2",
            params![at.to_rfc3339(), story_id],
        )?;
        Ok(())
    }

    async fn list_progress(&self) -> StorageResult<Vec<(String, ProgressRecord)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT story_id, highest_completed, last_attempted_at FROM story_progress ORDER BY story_id",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Value>(1)?,
                row.get::<_, Value>(2)?,
            ))
        })?;

        let mut progress = Vec::new();
        for row in rows {
            let (story_id, highest, attempted) = row?;
            match decode_progress(&story_id, highest, attempted) {
                Ok(record) => progress.push((story_id, record)),
                Err(e) => tracing::warn!("Skipping unreadable progress row: {}", e),
            }
        }
        Ok(progress)
    }

    // ===== Run Bookkeeping =====

    async fn begin_run(&self, config_hash: &str) -> StorageResult<Option<i64>> {
        let conn = self.lock()?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(Some(conn.last_insert_rowid()))
    }

    async fn finish_run(
        &self,
        run_id: i64,
        status: RunStatus,
        summary: &RunSummary,
    ) -> StorageResult<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let skipped = summary.stories_skipped();
        tx.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, stories_done = ?3,
                stories_skipped = ?4, chapters_committed = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                summary.stories_done().len() as i64,
                skipped.len() as i64,
                summary.chapters_committed() as i64,
                run_id
            ],
        )?;

        for (story_id, reason) in skipped {
            tx.execute(
                "INSERT INTO run_skips (run_id, story_id, reason) VALUES (?1, ?2, ?3)",
                params![run_id, story_id, reason.to_db_string()],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status,
                    stories_done, stories_skipped, chapters_committed
             FROM runs ORDER BY id DESC LIMIT 1",
        )?;

        let run = stmt
            .query_row([], |row| {
                Ok(RunRecord {
                    id: row.get(0)?,
                    started_at: row.get(1)?,
                    finished_at: row.get(2)?,
                    config_hash: row.get(3)?,
                    status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
                        .unwrap_or(RunStatus::Running),
                    stories_done: row.get(5)?,
                    stories_skipped: row.get(6)?,
                    chapters_committed: row.get(7)?,
                })
            })
            .optional()?;

        Ok(run)
    }
}
