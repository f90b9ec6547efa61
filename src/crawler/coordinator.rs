//! Run coordinator
//!
//! Drives one bounded run: stories are processed one after another, each
//! through `Discovering → Planning → Fetching ⇄ Committing → Done | Skipped`.
//! Chapter fetches for one story run concurrently, but results are consumed
//! in sequence order and committed one at a time: sink first, then the
//! state store counter.

use crate::config::Config;
use crate::crawler::catalog::{fetch_with_retry, Catalog};
use crate::crawler::fetcher::{PageFetcher, TransportError};
use crate::crawler::parser::{ChapterPage, SiteParser, StorySkeleton};
use crate::crawler::planner::{plan, ChapterPlan};
use crate::crawler::retry::{RetryError, RetryPolicy};
use crate::model::ChapterRecord;
use crate::output::{write_markdown_report, RunSummary, StoryOutcome};
use crate::sink::{Sink, SinkError};
use crate::state::{ProgressRecord, SkipReason, StoryState};
use crate::storage::{CrawlStateStore, RunStatus, StorageError};
use crate::url::{chapter_url, story_id_from_url};
use crate::TrackerError;
use chrono::Utc;
use futures::StreamExt;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Why a story left the pipeline before `Done`
#[derive(Debug)]
struct Abandon {
    reason: SkipReason,
    detail: String,
}

impl Abandon {
    fn new(reason: SkipReason, detail: impl Display) -> Self {
        Self {
            reason,
            detail: detail.to_string(),
        }
    }

    fn cancelled() -> Self {
        Self::new(SkipReason::Cancelled, "run cancelled")
    }

    /// Maps a retry failure, keeping cancellation distinct from `reason`
    fn from_retry<E: Display>(reason: SkipReason, error: RetryError<E>) -> Self {
        match error {
            RetryError::Cancelled => Self::cancelled(),
            other => Self::new(reason, other),
        }
    }
}

/// In-memory working copy of one story's progress during a run
struct StoryRun {
    story_id: String,
    state: StoryState,
    committed: u32,
    highest: Option<u32>,
}

impl StoryRun {
    fn new(story_id: impl Into<String>) -> Self {
        Self {
            story_id: story_id.into(),
            state: StoryState::Discovering,
            committed: 0,
            highest: None,
        }
    }

    fn advance(&mut self, next: StoryState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        tracing::trace!("{}: {} -> {}", self.story_id, self.state, next);
        self.state = next;
    }

    fn done(mut self) -> StoryOutcome {
        self.advance(StoryState::Done);
        tracing::info!(
            "Story {} done: {} new chapters (highest {:?})",
            self.story_id,
            self.committed,
            self.highest
        );
        StoryOutcome::done(self.story_id, self.committed, self.highest)
    }

    fn skip(mut self, abandon: Abandon) -> StoryOutcome {
        self.advance(StoryState::Skipped);
        tracing::warn!(
            "Skipping story {} ({}): {}",
            self.story_id,
            abandon.reason,
            abandon.detail
        );
        StoryOutcome::skipped(
            self.story_id,
            abandon.reason,
            self.committed,
            self.highest,
        )
    }
}

/// Coordinates a crawl run across the catalog
pub struct Coordinator {
    config: Config,
    fetcher: Arc<dyn PageFetcher>,
    parser: Arc<dyn SiteParser>,
    store: Arc<dyn CrawlStateStore>,
    sink: Arc<dyn Sink>,
    cancel: CancellationToken,
    retry: RetryPolicy,
    timeout: Duration,
}

impl Coordinator {
    /// Creates a coordinator from already-built collaborators
    pub fn new(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        parser: Arc<dyn SiteParser>,
        store: Arc<dyn CrawlStateStore>,
        sink: Arc<dyn Sink>,
        cancel: CancellationToken,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config.crawler);
        let timeout = Duration::from_millis(config.crawler.request_timeout_ms);
        Self {
            config,
            fetcher,
            parser,
            store,
            sink,
            cancel,
            retry,
            timeout,
        }
    }

    /// Overrides the retry policy derived from configuration
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Token that cancels this run when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs with bookkeeping: records the run in the store and writes the
    /// markdown report if one is configured
    pub async fn run_tracked(&self, config_hash: &str) -> Result<RunSummary, TrackerError> {
        let run_id = self.store.begin_run(config_hash).await?;
        match run_id {
            Some(id) => tracing::info!("Starting crawl run {}", id),
            None => tracing::info!("Starting crawl run"),
        }

        let summary = self.run().await;

        if let Some(id) = run_id {
            let status = if summary.cancelled {
                RunStatus::Interrupted
            } else {
                RunStatus::Completed
            };
            self.store.finish_run(id, status, &summary).await?;
        }

        if let Some(path) = &self.config.output.summary_path {
            write_markdown_report(Path::new(path), &summary, run_id, config_hash)?;
            tracing::info!("Wrote run report to {}", path);
        }

        Ok(summary)
    }

    /// Discovers the catalog and processes it
    pub async fn run(&self) -> RunSummary {
        let limit = self.config.crawler.max_stories_per_run as usize;
        let catalog = Catalog {
            site: &self.config.site,
            fetcher: self.fetcher.as_ref(),
            parser: self.parser.as_ref(),
            retry: self.retry,
            timeout: self.timeout,
        };

        let stories = if limit == 0 {
            Vec::new()
        } else {
            catalog.discover(limit, &self.cancel).await
        };
        tracing::info!("Catalog has {} stories", stories.len());

        self.run_catalog(&stories).await
    }

    /// Processes the given story URLs in order, within the story budget
    ///
    /// The budget is checked only between stories; a story that has started
    /// always reaches `Done` or `Skipped`.
    pub async fn run_catalog(&self, story_urls: &[String]) -> RunSummary {
        let budget = self.config.crawler.max_stories_per_run as usize;
        let mut summary = RunSummary::new();
        let start_time = std::time::Instant::now();

        for url in story_urls {
            if self.cancel.is_cancelled() {
                break;
            }
            if summary.stories_touched() >= budget {
                tracing::info!("Story budget of {} reached", budget);
                break;
            }

            let outcome = self.process_story(url).await;
            let cancelled = outcome.skip_reason == Some(SkipReason::Cancelled);
            summary.record(outcome);
            if cancelled {
                break;
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.finish();

        tracing::info!(
            "Run finished in {:?}: {} done, {} skipped, {} chapters committed{}",
            start_time.elapsed(),
            summary.stories_done().len(),
            summary.stories_skipped().len(),
            summary.chapters_committed(),
            if summary.cancelled { " (cancelled)" } else { "" }
        );

        summary
    }

    /// Takes one story from discovery to a terminal state
    async fn process_story(&self, story_url: &str) -> StoryOutcome {
        let story_id = match story_id_from_url(story_url) {
            Ok(id) => id,
            Err(e) => {
                return StoryRun::new(story_url).skip(Abandon::new(SkipReason::DiscoveryFailed, e))
            }
        };
        let mut run = StoryRun::new(&story_id);
        tracing::info!("Processing story {} ({})", story_id, story_url);

        let skeleton = match self.discover_story(&story_id, story_url).await {
            Ok(skeleton) => skeleton,
            Err(abandon) => return run.skip(abandon),
        };

        let progress = match self.load_progress(&story_id).await {
            Ok(progress) => progress,
            Err(abandon) => return run.skip(abandon),
        };

        run.advance(StoryState::Planning);
        let known = progress.map(|p| p.highest_completed_sequence_number);
        run.highest = known;

        let mut chapter_plan = plan(
            &story_id,
            known,
            self.config.crawler.max_chapters_per_story_per_run.as_option(),
        );
        // A listed chapter list already says where the story ends, so the
        // chapter after it is not requested to confirm a not-found.
        if let Some(latest) = skeleton.latest_sequence {
            chapter_plan = chapter_plan.cap_at(latest);
        }
        tracing::info!("Plan for {}", chapter_plan);

        run.advance(StoryState::Fetching);
        let result = if chapter_plan.is_empty() {
            Ok(())
        } else {
            self.fetch_and_commit(&mut run, &skeleton, story_url, &chapter_plan)
                .await
        };

        match result {
            Ok(()) => {
                self.touch(&story_id).await;
                run.done()
            }
            Err(abandon) => {
                if abandon.reason != SkipReason::Cancelled {
                    self.touch(&story_id).await;
                }
                run.skip(abandon)
            }
        }
    }

    /// Fetches and parses the story page
    async fn discover_story(
        &self,
        story_id: &str,
        story_url: &str,
    ) -> Result<StorySkeleton, Abandon> {
        let base =
            Url::parse(story_url).map_err(|e| Abandon::new(SkipReason::DiscoveryFailed, e))?;

        let body = fetch_with_retry(
            self.fetcher.as_ref(),
            &self.retry,
            self.timeout,
            &self.cancel,
            story_url,
        )
        .await
        .map_err(|e| Abandon::from_retry(SkipReason::DiscoveryFailed, e))?
        .ok_or_else(|| {
            Abandon::new(
                SkipReason::DiscoveryFailed,
                format!("{} not found", story_url),
            )
        })?;

        self.parser
            .parse_story(story_id, &body, &base)
            .map_err(|e| Abandon::new(SkipReason::DiscoveryFailed, e))
    }

    async fn load_progress(&self, story_id: &str) -> Result<Option<ProgressRecord>, Abandon> {
        let label = format!("reading progress of {}", story_id);
        self.retry
            .run_when(&self.cancel, &label, StorageError::is_retryable, || {
                self.store.get(story_id)
            })
            .await
            .map_err(|e| match e {
                RetryError::Cancelled => Abandon::cancelled(),
                RetryError::Aborted(err) if err.is_corrupt() => {
                    Abandon::new(SkipReason::CorruptState, err)
                }
                other => Abandon::new(SkipReason::StorageUnavailable, other),
            })
    }

    /// Fetches planned chapters concurrently and commits them in order
    ///
    /// Stops at the first not-found chapter. Dropping the stream on an
    /// early return abandons every fetch still in flight.
    async fn fetch_and_commit(
        &self,
        run: &mut StoryRun,
        skeleton: &StorySkeleton,
        story_url: &str,
        chapter_plan: &ChapterPlan,
    ) -> Result<(), Abandon> {
        let concurrency = self.config.crawler.max_concurrent_chapter_fetches.max(1) as usize;
        let chapters = futures::stream::iter(chapter_plan.iter())
            .map(|n| self.fetch_chapter(story_url, n))
            .buffered(concurrency);
        let mut chapters = std::pin::pin!(chapters);

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(Abandon::cancelled()),
                next = chapters.next() => next,
            };

            let Some((n, result)) = next else {
                return Ok(());
            };

            match result {
                Ok(ChapterPage::Images(images)) => {
                    run.advance(StoryState::Committing);
                    self.commit_chapter(skeleton, n, images).await?;
                    run.committed += 1;
                    run.highest = Some(n);
                    run.advance(StoryState::Fetching);
                }
                Ok(ChapterPage::NotFound) => {
                    tracing::info!(
                        "{}: chapter {} is not published yet, stopping",
                        run.story_id,
                        n
                    );
                    return Ok(());
                }
                Err(e) => {
                    return Err(Abandon::from_retry(
                        SkipReason::FetchFailed,
                        e,
                    ))
                }
            }
        }
    }

    async fn fetch_chapter(
        &self,
        story_url: &str,
        n: u32,
    ) -> (u32, Result<ChapterPage, RetryError<TransportError>>) {
        let url = chapter_url(&self.config.site.chapter_url, story_url, n);
        let base = match Url::parse(&url) {
            Ok(base) => base,
            Err(_) => {
                return (
                    n,
                    Err(RetryError::Aborted(TransportError::InvalidUrl { url })),
                )
            }
        };

        let result = fetch_with_retry(
            self.fetcher.as_ref(),
            &self.retry,
            self.timeout,
            &self.cancel,
            &url,
        )
        .await
        .map(|body| match body {
            Some(body) => self.parser.parse_chapter(&body, &base),
            None => ChapterPage::NotFound,
        });

        tracing::debug!("Fetched chapter {} from {}", n, url);
        (n, result)
    }

    /// Writes the chapter to the sink, then advances the stored counter
    ///
    /// Content is durable before the counter moves, so a crash in between
    /// only causes a re-fetch that the sink merges away.
    async fn commit_chapter(
        &self,
        skeleton: &StorySkeleton,
        n: u32,
        images: Vec<String>,
    ) -> Result<ProgressRecord, Abandon> {
        let chapter = match skeleton.labels.get(&n) {
            Some(label) => ChapterRecord::named(n, label.as_str(), images),
            None => ChapterRecord::new(n, images),
        };
        let record = skeleton.record.with_chapters(vec![chapter]);

        let label = format!("persisting {} chapter {}", record.id, n);
        self.retry
            .run_when(&self.cancel, &label, SinkError::is_retryable, || {
                self.sink.persist(&record)
            })
            .await
            .map_err(|e| Abandon::from_retry(SkipReason::CommitFailed, e))?;

        let label = format!("committing {} chapter {}", record.id, n);
        let progress = self
            .retry
            .run_when(&self.cancel, &label, StorageError::is_retryable, || {
                self.store.commit(&record.id, n, Utc::now())
            })
            .await
            .map_err(|e| Abandon::from_retry(SkipReason::CommitFailed, e))?;

        tracing::debug!(
            "Committed {} chapter {} ({} images)",
            record.id,
            n,
            record.chapters.first().map_or(0, |c| c.images.len())
        );
        Ok(progress)
    }

    /// Records that the story was looked at, without touching its counter
    async fn touch(&self, story_id: &str) {
        if let Err(e) = self.store.mark_attempted(story_id, Utc::now()).await {
            tracing::warn!("Could not record attempt for {}: {}", story_id, e);
        }
    }
}
