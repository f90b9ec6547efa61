//! JSON file state backend
//!
//! Progress lives in a single object keyed by story id. Writes go to a
//! temporary file in the same directory and are renamed over the old one.

use crate::state::ProgressRecord;
use crate::storage::traits::{next_progress, CrawlStateStore, StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::NamedTempFile;

/// File-backed state store for single-process use
pub struct JsonStateStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

/// Contents of the state file as read from disk
enum Document {
    Entries(Map<String, Value>),
    Malformed(String),
}

impl JsonStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> StorageResult<Document> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Document::Entries(Map::new()))
            }
            Err(e) => {
                return Err(StorageError::Unavailable(format!(
                    "{}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        if content.trim().is_empty() {
            return Ok(Document::Entries(Map::new()));
        }

        Ok(match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(entries)) => Document::Entries(entries),
            Ok(_) => Document::Malformed("state file is not a JSON object".to_string()),
            Err(e) => Document::Malformed(e.to_string()),
        })
    }

    fn write_document(&self, entries: &Map<String, Value>) -> StorageResult<()> {
        let bytes = serde_json::to_vec_pretty(entries)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }
}

fn decode_entry(story_id: &str, value: &Value) -> StorageResult<ProgressRecord> {
    let record: ProgressRecord =
        serde_json::from_value(value.clone()).map_err(|e| StorageError::CorruptState {
            story_id: story_id.to_string(),
            reason: e.to_string(),
        })?;

    if record.highest_completed_sequence_number == 0 {
        return Err(StorageError::CorruptState {
            story_id: story_id.to_string(),
            reason: "highest_completed_sequence_number is 0".to_string(),
        });
    }
    Ok(record)
}

fn lookup(
    document: &Document,
    story_id: &str,
) -> StorageResult<Option<ProgressRecord>> {
    match document {
        Document::Malformed(reason) => Err(StorageError::CorruptState {
            story_id: story_id.to_string(),
            reason: reason.clone(),
        }),
        Document::Entries(entries) => entries
            .get(story_id)
            .map(|value| decode_entry(story_id, value))
            .transpose(),
    }
}

/// Writes `bytes` to `path` via a synced temp file and a rename
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut tmp = NamedTempFile::new_in(&dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[async_trait]
impl CrawlStateStore for JsonStateStore {
    fn backend_name(&self) -> &'static str {
        "json"
    }

    async fn get(&self, story_id: &str) -> StorageResult<Option<ProgressRecord>> {
        let document = self.read_document()?;
        lookup(&document, story_id)
    }

    async fn commit(
        &self,
        story_id: &str,
        sequence_number: u32,
        at: DateTime<Utc>,
    ) -> StorageResult<ProgressRecord> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("state file lock poisoned".to_string()))?;

        let document = self.read_document()?;
        let current = lookup(&document, story_id)?;
        let next = next_progress(story_id, current, sequence_number, at)?;

        // Malformed documents already failed the lookup above.
        if let (true, Document::Entries(mut entries)) = (Some(next) != current, document) {
            let value = serde_json::to_value(next)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            entries.insert(story_id.to_string(), value);
            self.write_document(&entries)?;
        }

        Ok(next)
    }

    async fn mark_attempted(&self, story_id: &str, at: DateTime<Utc>) -> StorageResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| StorageError::Unavailable("state file lock poisoned".to_string()))?;

        let document = self.read_document()?;
        let Some(current) = lookup(&document, story_id)? else {
            return Ok(());
        };
        let Document::Entries(mut entries) = document else {
            return Ok(());
        };

        let updated = ProgressRecord::new(current.highest_completed_sequence_number, at);
        let value = serde_json::to_value(updated)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        entries.insert(story_id.to_string(), value);
        self.write_document(&entries)
    }

    async fn list_progress(&self) -> StorageResult<Vec<(String, ProgressRecord)>> {
        let entries = match self.read_document()? {
            Document::Entries(entries) => entries,
            Document::Malformed(reason) => {
                tracing::warn!("State file {} is unreadable: {}", self.path.display(), reason);
                return Ok(Vec::new());
            }
        };

        let mut progress: Vec<(String, ProgressRecord)> = Vec::new();
        for (story_id, value) in &entries {
            match decode_entry(story_id, value) {
                Ok(record) => progress.push((story_id.clone(), record)),
                Err(e) => tracing::warn!("Skipping unreadable progress entry: {}", e),
            }
        }
        progress.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(progress)
    }
}
