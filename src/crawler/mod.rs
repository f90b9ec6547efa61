//! Crawler module for story discovery and incremental chapter fetching
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `PageFetcher` port
//! - Selector-driven parsing of listing, story and chapter pages
//! - Resume planning and bounded retries
//! - Overall run coordination

mod catalog;
mod coordinator;
mod fetcher;
mod parser;
mod planner;
mod retry;

pub use catalog::Catalog;
pub use coordinator::Coordinator;
pub use fetcher::{build_http_client, FetchedPage, HttpFetcher, PageFetcher, TransportError};
pub use parser::{chapter_number, ChapterPage, ParseError, SelectorParser, SiteParser, StorySkeleton};
pub use planner::{plan, ChapterPlan};
pub use retry::{RetryError, RetryPolicy};

use crate::config::Config;
use crate::output::RunSummary;
use crate::sink::open_sink;
use crate::storage::open_state_store;
use crate::TrackerError;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Runs one complete, bounded crawl
///
/// This is the main entry point for a run. It will:
/// 1. Open the state store and the sink
/// 2. Build the HTTP client and the selector parser
/// 3. Discover the story catalog
/// 4. Fetch and commit new chapters story by story
/// 5. Record the run and write the optional report
///
/// # Example
///
/// ```no_run
/// use manga_tracker::config::Config;
/// use manga_tracker::crawler::run_crawl;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let summary = run_crawl(Config::default(), "hash", CancellationToken::new()).await?;
/// println!("{}", summary);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    config_hash: &str,
    cancel: CancellationToken,
) -> Result<RunSummary, TrackerError> {
    let timeout = Duration::from_millis(config.crawler.request_timeout_ms);

    let fetcher = Arc::new(HttpFetcher::new(&config.crawler)?);
    let parser = Arc::new(SelectorParser::new(&config.site.selectors)?);
    let store = open_state_store(&config.state)?;
    let sink = open_sink(&config.sink, timeout)?;

    tracing::info!(
        "Using {} state store and {} sink",
        store.backend_name(),
        sink.name()
    );

    let coordinator = Coordinator::new(config, fetcher, parser, store, sink, cancel);
    coordinator.run_tracked(config_hash).await
}
