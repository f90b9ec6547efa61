//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the crawl state database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL,
    stories_done INTEGER NOT NULL DEFAULT 0,
    stories_skipped INTEGER NOT NULL DEFAULT 0,
    chapters_committed INTEGER NOT NULL DEFAULT 0
);

-- Per-story resume point; rows are never deleted by the crawler
CREATE TABLE IF NOT EXISTS story_progress (
    story_id TEXT PRIMARY KEY,
    highest_completed INTEGER NOT NULL,
    last_attempted_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- Stories abandoned during a run, with their reason code
CREATE TABLE IF NOT EXISTS run_skips (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    story_id TEXT NOT NULL,
    reason TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_run_skips_run ON run_skips(run_id);
"#;

/// Initializes the database schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
