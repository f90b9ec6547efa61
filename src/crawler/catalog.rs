//! Catalog discovery
//!
//! Builds the ordered list of story URLs a run works through: configured
//! stories first, then whatever the listing pages link to.

use crate::config::SiteConfig;
use crate::crawler::fetcher::{PageFetcher, TransportError};
use crate::crawler::parser::SiteParser;
use crate::crawler::retry::{RetryError, RetryPolicy};
use crate::url::{listing_url, normalize_story_url};
use std::collections::HashSet;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Fetches one page through the retry policy with a per-attempt timeout
///
/// `Ok(None)` is the not-found sentinel (404/410).
pub(crate) async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    retry: &RetryPolicy,
    timeout: Duration,
    cancel: &CancellationToken,
    url: &str,
) -> Result<Option<String>, RetryError<TransportError>> {
    retry
        .run_when(cancel, url, TransportError::is_retryable, || async move {
            match tokio::time::timeout(timeout, fetcher.fetch(url)).await {
                Ok(page) => page?.into_body(),
                Err(_) => Err(TransportError::Timeout {
                    url: url.to_string(),
                }),
            }
        })
        .await
}

/// Story discovery over configured stories and listing pages
pub struct Catalog<'a> {
    pub site: &'a SiteConfig,
    pub fetcher: &'a dyn PageFetcher,
    pub parser: &'a dyn SiteParser,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl Catalog<'_> {
    /// Discovers up to `limit` story URLs, de-duplicated in first-seen order
    ///
    /// Listing pages that fail after retries are logged and skipped.
    pub async fn discover(&self, limit: usize, cancel: &CancellationToken) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut stories = Vec::new();

        for story in &self.site.stories {
            match normalize_story_url(story) {
                Ok(url) => {
                    if seen.insert(url.to_string()) {
                        stories.push(url.to_string());
                    }
                }
                Err(e) => tracing::warn!("Ignoring configured story {}: {}", story, e),
            }
        }

        for page in self.site.listing_start_page..=self.site.listing_end_page {
            if stories.len() >= limit || cancel.is_cancelled() {
                break;
            }

            let url = listing_url(&self.site.listing_url, page);
            let base = match Url::parse(&url) {
                Ok(base) => base,
                Err(e) => {
                    tracing::warn!("Invalid listing URL {}: {}", url, e);
                    continue;
                }
            };

            let body =
                match fetch_with_retry(self.fetcher, &self.retry, self.timeout, cancel, &url).await
                {
                    Ok(Some(body)) => body,
                    Ok(None) => {
                        tracing::info!("Listing page {} not found, stopping discovery", page);
                        break;
                    }
                    Err(RetryError::Cancelled) => break,
                    Err(e) => {
                        tracing::warn!("Skipping listing page {}: {}", page, e);
                        continue;
                    }
                };

            let found = self.parser.parse_listing(&body, &base);
            let before = stories.len();
            for story in found {
                if seen.insert(story.clone()) {
                    stories.push(story);
                }
            }
            tracing::info!(
                "Listing page {}: {} new stories ({} total)",
                page,
                stories.len() - before,
                stories.len()
            );
        }

        stories
    }
}
