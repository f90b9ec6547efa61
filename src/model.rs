//! Story and chapter records
//!
//! These are the explicit record shapes handed to sinks and written to the
//! persisted story file. Validation happens once, at the sink boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reasons a record is rejected before it reaches a sink
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("story id is empty")]
    EmptyId,

    #[error("chapter sequence numbers must be positive, got {0}")]
    ZeroSequence(u32),

    #[error("chapter {got} is out of order after chapter {previous}")]
    OutOfOrder { previous: u32, got: u32 },

    #[error("chapter {0} has no images")]
    NoImages(u32),

    #[error("chapter {sequence_number} has a non-absolute image URL: {url}")]
    RelativeImage { sequence_number: u32, url: String },
}

/// One numbered installment of a story
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterRecord {
    /// 1-based position in publication order
    pub sequence_number: u32,

    /// Human label, e.g. "Chapter 12"
    pub display_name: String,

    /// Absolute image URLs in reading order
    pub images: Vec<String>,
}

impl ChapterRecord {
    /// Creates a chapter with the default "Chapter N" label
    pub fn new(sequence_number: u32, images: Vec<String>) -> Self {
        Self {
            sequence_number,
            display_name: format!("Chapter {}", sequence_number),
            images,
        }
    }

    /// Creates a chapter labelled the way the site labels it
    pub fn named(sequence_number: u32, display_name: impl Into<String>, images: Vec<String>) -> Self {
        Self {
            sequence_number,
            display_name: display_name.into(),
            images,
        }
    }
}

/// A story with its descriptive metadata and the chapters known for it
///
/// The `id` is the key of the persisted mapping, so it is not repeated
/// inside the serialized value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoryRecord {
    #[serde(skip)]
    pub id: String,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub author: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub thumbnail_url: Option<String>,

    /// Chapters sorted oldest to newest
    #[serde(default)]
    pub chapters: Vec<ChapterRecord>,
}

impl StoryRecord {
    /// Creates an empty record for the given story id
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Returns a copy of the metadata with the given chapters attached
    pub fn with_chapters(&self, chapters: Vec<ChapterRecord>) -> Self {
        Self {
            chapters,
            ..self.clone()
        }
    }

    /// Checks the record invariants
    pub fn validate(&self) -> Result<(), RecordError> {
        if self.id.trim().is_empty() {
            return Err(RecordError::EmptyId);
        }

        let mut previous: Option<u32> = None;
        for chapter in &self.chapters {
            if chapter.sequence_number == 0 {
                return Err(RecordError::ZeroSequence(0));
            }
            if let Some(prev) = previous {
                if chapter.sequence_number <= prev {
                    return Err(RecordError::OutOfOrder {
                        previous: prev,
                        got: chapter.sequence_number,
                    });
                }
            }
            if chapter.images.is_empty() {
                return Err(RecordError::NoImages(chapter.sequence_number));
            }
            if let Some(bad) = chapter
                .images
                .iter()
                .find(|u| !(u.starts_with("http://") || u.starts_with("https://")))
            {
                return Err(RecordError::RelativeImage {
                    sequence_number: chapter.sequence_number,
                    url: bad.clone(),
                });
            }
            previous = Some(chapter.sequence_number);
        }

        Ok(())
    }

    /// Merges another record of the same story into this one
    ///
    /// Metadata present in `other` replaces ours. Chapters are merged by
    /// sequence number (the incoming chapter wins) and kept sorted.
    pub fn merge(&mut self, other: StoryRecord) {
        if other.title.is_some() {
            self.title = other.title;
        }
        if other.author.is_some() {
            self.author = other.author;
        }
        if other.description.is_some() {
            self.description = other.description;
        }
        if other.thumbnail_url.is_some() {
            self.thumbnail_url = other.thumbnail_url;
        }

        for chapter in other.chapters {
            match self
                .chapters
                .binary_search_by_key(&chapter.sequence_number, |c| c.sequence_number)
            {
                Ok(idx) => self.chapters[idx] = chapter,
                Err(idx) => self.chapters.insert(idx, chapter),
            }
        }
    }
}
