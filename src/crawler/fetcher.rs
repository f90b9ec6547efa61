//! HTTP fetcher implementation
//!
//! This module is the crawler's only door to the network:
//! - Building the HTTP client with the configured user agent and timeouts
//! - The `PageFetcher` port the coordinator depends on
//! - Classifying responses into body, not-found, or transport failure

use crate::config::CrawlerConfig;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use thiserror::Error;

/// Failures talking to the remote site
///
/// Timeouts, network errors and unexpected statuses go through the retry
/// policy; a malformed URL fails at once.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("request to {url} timed out")]
    Timeout { url: String },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("invalid URL {url}")]
    InvalidUrl { url: String },
}

impl TransportError {
    /// Returns true if another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidUrl { .. })
    }
}

/// Raw result of fetching one URL
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// HTTP status code
    pub status: u16,

    /// Page body content
    pub body: String,

    /// Final URL after redirects
    pub final_url: String,
}

impl FetchedPage {
    /// Returns true for statuses that mean the page does not exist (yet)
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16() || self.status == StatusCode::GONE.as_u16()
    }

    /// Classifies the response
    ///
    /// | Status | Result |
    /// |--------|--------|
    /// | 2xx | `Ok(Some(body))` |
    /// | 404, 410 | `Ok(None)`, the not-found sentinel |
    /// | anything else | `Err(TransportError::Status)` |
    pub fn into_body(self) -> Result<Option<String>, TransportError> {
        if (200..300).contains(&self.status) {
            Ok(Some(self.body))
        } else if self.is_not_found() {
            Ok(None)
        } else {
            Err(TransportError::Status {
                url: self.final_url,
                status: self.status,
            })
        }
    }
}

/// Fetch port: given a URL, returns the status and body or a transport error
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Example
///
/// ```no_run
/// use manga_tracker::config::CrawlerConfig;
/// use manga_tracker::crawler::build_http_client;
///
/// let client = build_http_client(&CrawlerConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &CrawlerConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageFetcher` backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &CrawlerConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }
}

fn classify_reqwest_error(url: &str, error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_builder() {
        TransportError::InvalidUrl {
            url: url.to_string(),
        }
    } else {
        TransportError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage, TransportError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response
            .text()
            .await
            .map_err(|e| classify_reqwest_error(url, e))?;

        tracing::debug!("GET {} -> {}", url, status);

        Ok(FetchedPage {
            status,
            body,
            final_url,
        })
    }
}
