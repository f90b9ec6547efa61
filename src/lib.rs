//! Manga Tracker: an incremental manga crawler
//!
//! This crate discovers stories on a manga listing site, fetches only the
//! chapters that previous runs have not committed yet, and hands the results
//! to a sink (a local JSON file or a remote API). Progress is tracked per
//! story so every run resumes exactly where the last one stopped.

pub mod config;
pub mod crawler;
pub mod model;
pub mod output;
pub mod sink;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Manga Tracker operations
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid CSS selector: {0}")]
    InvalidSelector(String),

    #[error("Missing sink target: {0}")]
    MissingSink(String),

    #[error("Invalid value for environment variable {key}: {message}")]
    InvalidEnv { key: String, message: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("URL has no story slug: {0}")]
    MissingSlug(String),
}

/// Result type alias for Manga Tracker operations
pub type Result<T> = std::result::Result<T, TrackerError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use model::{ChapterRecord, StoryRecord};
pub use state::{ProgressRecord, SkipReason, StoryState};
pub use url::{chapter_url, story_id_from_url};
