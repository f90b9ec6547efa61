//! Storage module for persisting crawl progress
//!
//! This module owns the durable story-id to progress mapping:
//! - SQLite backend with transactional commits and run history
//! - JSON file backend with atomic temp-file-and-rename writes
//! - Run tracking for the SQLite backend

mod json_file;
mod schema;
mod sqlite;
mod traits;

pub use json_file::JsonStateStore;
pub use sqlite::SqliteStateStore;
pub use traits::{CrawlStateStore, StorageError, StorageResult};

pub(crate) use json_file::write_atomic;

use crate::config::{StateBackend, StateConfig};
use std::path::Path;
use std::sync::Arc;

/// Opens the state backend selected in configuration
///
/// # Returns
///
/// * `Ok(Arc<dyn CrawlStateStore>)` - Store ready for use
/// * `Err(StorageError)` - The backend could not be opened
pub fn open_state_store(config: &StateConfig) -> StorageResult<Arc<dyn CrawlStateStore>> {
    let path = Path::new(&config.path);
    let store: Arc<dyn CrawlStateStore> = match config.backend {
        StateBackend::Sqlite => Arc::new(SqliteStateStore::new(path)?),
        StateBackend::Json => Arc::new(JsonStateStore::new(path)),
    };
    tracing::debug!(
        "Opened {} state store at {}",
        store.backend_name(),
        path.display()
    );
    Ok(store)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub stories_done: i64,
    pub stories_skipped: i64,
    pub chapters_committed: i64,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
