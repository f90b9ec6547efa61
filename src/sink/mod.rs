//! Sinks: where scraped story records end up
//!
//! A sink durably stores or publishes a [`StoryRecord`]. The coordinator
//! hands it the story metadata plus the chapter it is about to commit; the
//! sink merges that into whatever it already holds, so persisting the same
//! chapter twice is harmless.

mod api;
mod json_file;

pub use api::ApiSink;
pub use json_file::JsonFileSink;

use crate::config::{SinkConfig, SinkKind};
use crate::model::{RecordError, StoryRecord};
use crate::ConfigError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Errors reported by a sink
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] RecordError),

    #[error("Sink rejected request to {endpoint} with status {status}")]
    Rejected { endpoint: String, status: u16 },

    #[error("Unexpected sink response: {0}")]
    Protocol(String),

    #[error("Existing sink file is unreadable: {0}")]
    CorruptFile(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SinkError {
    /// Returns true for failures that may clear up on a later attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::Io(_) => true,
            Self::Rejected { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Destination for story records
#[async_trait]
pub trait Sink: Send + Sync {
    /// Short sink name for logs
    fn name(&self) -> &'static str;

    /// Durably stores `record`, merging chapters by sequence number
    async fn persist(&self, record: &StoryRecord) -> SinkResult<()>;
}

/// Builds the sink selected in configuration
///
/// A missing target or an unset credential variable is a startup error.
pub fn open_sink(config: &SinkConfig, timeout: Duration) -> Result<Arc<dyn Sink>, ConfigError> {
    match config.kind {
        SinkKind::File => {
            let path = config
                .path
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .ok_or_else(|| ConfigError::MissingSink("file sink requires sink.path".into()))?;
            Ok(Arc::new(JsonFileSink::new(path)))
        }
        SinkKind::Api => {
            let endpoint = config
                .endpoint
                .as_deref()
                .filter(|e| !e.trim().is_empty())
                .ok_or_else(|| {
                    ConfigError::MissingSink("api sink requires sink.endpoint".into())
                })?;

            let token = match config.api_key_env.as_deref() {
                Some(var) => Some(std::env::var(var).map_err(|_| ConfigError::InvalidEnv {
                    key: var.to_string(),
                    message: "API key variable is not set".to_string(),
                })?),
                None => None,
            };

            let sink = ApiSink::new(endpoint, token, timeout)
                .map_err(|e| ConfigError::Validation(format!("api sink client: {}", e)))?;
            Ok(Arc::new(sink))
        }
    }
}
