//! Local JSON story file
//!
//! The file is an object keyed by story id whose values carry the story
//! metadata and its chapters sorted by sequence number. Other tools read
//! this layout, so it is kept stable.

use crate::model::StoryRecord;
use crate::sink::{Sink, SinkError, SinkResult};
use crate::storage::write_atomic;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// Sink that merges records into a JSON file on disk
pub struct JsonFileSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads every story currently in the file
    pub fn load(&self) -> SinkResult<BTreeMap<String, StoryRecord>> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(SinkError::Io(e)),
        };

        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }

        let mut stories: BTreeMap<String, StoryRecord> = serde_json::from_str(&content)
            .map_err(|e| SinkError::CorruptFile(format!("{}: {}", self.path.display(), e)))?;

        for (id, story) in stories.iter_mut() {
            story.id = id.clone();
            story.chapters.sort_by_key(|c| c.sequence_number);
        }
        Ok(stories)
    }
}

#[async_trait]
impl Sink for JsonFileSink {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn persist(&self, record: &StoryRecord) -> SinkResult<()> {
        record.validate()?;

        let _guard = self.write_lock.lock().await;
        let mut stories = self.load()?;

        stories
            .entry(record.id.clone())
            .or_insert_with(|| StoryRecord::new(record.id.clone()))
            .merge(record.clone());

        let bytes = serde_json::to_vec_pretty(&stories)
            .map_err(|e| SinkError::Serialization(e.to_string()))?;
        write_atomic(&self.path, &bytes)?;

        tracing::debug!(
            "Wrote story '{}' to {} ({} stories)",
            record.id,
            self.path.display(),
            stories.len()
        );
        Ok(())
    }
}
