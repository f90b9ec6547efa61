//! Shared fixtures: a mock manga site and a ready-to-run coordinator

use manga_tracker::config::{ChapterBudget, Config, SinkConfig, SinkKind, StateBackend, StateConfig};
use manga_tracker::crawler::{Coordinator, HttpFetcher, RetryPolicy, SelectorParser};
use manga_tracker::sink::{JsonFileSink, Sink};
use manga_tracker::storage::{CrawlStateStore, SqliteStateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Story page; `advertised` chapters are linked from the chapter list
pub fn story_html(title: &str, slug: &str, advertised: u32) -> String {
    let links: String = (1..=advertised)
        .rev()
        .map(|n| format!(r#"<a href="/truyen/{slug}/chapter-{n}">Chapter {n}</a>"#))
        .collect();
    format!(
        r#"<html><body>
            <h1 class="title-detail">{title}</h1>
            <p class="author"><a>Someone</a></p>
            <div class="detail-content"><p>About {title}.</p></div>
            <div class="detail-info"><img src="/covers/{slug}.jpg"></div>
            <div class="list-chapter">{links}</div>
        </body></html>"#
    )
}

pub fn chapter_html(slug: &str, n: u32) -> String {
    format!(
        r#"<html><body>
            <div class="page-chapter"><img src="/img/{slug}/{n}/1.jpg"></div>
            <div class="page-chapter"><img data-src="/img/{slug}/{n}/2.jpg" src="/loading.gif"></div>
        </body></html>"#
    )
}

pub fn story_url(server: &MockServer, slug: &str) -> String {
    format!("{}/truyen/{}", server.uri(), slug)
}

/// Mounts a story page without a chapter list, so the crawler only learns
/// where the story ends from a not-found chapter
pub async fn mount_story(server: &MockServer, slug: &str, title: &str) {
    mount_story_advertising(server, slug, title, 0).await;
}

pub async fn mount_story_advertising(server: &MockServer, slug: &str, title: &str, advertised: u32) {
    mount_story_page(server, slug, story_html(title, slug, advertised)).await;
}

pub async fn mount_story_page(server: &MockServer, slug: &str, html: String) {
    Mock::given(method("GET"))
        .and(path(format!("/truyen/{}", slug)))
        .respond_with(ResponseTemplate::new(200).set_body_string(html))
        .mount(server)
        .await;
}

/// Story page whose chapter list uses the site's own chapter names
pub fn labelled_story_html(title: &str, slug: &str, labels: &[&str]) -> String {
    let links: String = labels
        .iter()
        .enumerate()
        .rev()
        .map(|(i, label)| format!(r#"<a href="/truyen/{slug}/chapter-{}">{label}</a>"#, i + 1))
        .collect();
    format!(
        r#"<html><body>
            <h1 class="title-detail">{title}</h1>
            <div class="list-chapter">{links}</div>
        </body></html>"#
    )
}

/// Mounts chapters `1..=count` with two images each
pub async fn mount_chapters(server: &MockServer, slug: &str, count: u32) {
    for n in 1..=count {
        Mock::given(method("GET"))
            .and(path(format!("/truyen/{}/chapter-{}", slug, n)))
            .respond_with(ResponseTemplate::new(200).set_body_string(chapter_html(slug, n)))
            .mount(server)
            .await;
    }
}

/// Temp directory plus a config pointing at the mock site
pub struct Fixture {
    pub dir: TempDir,
    pub config: Config,
}

impl Fixture {
    pub fn new(server: &MockServer, stories: Vec<String>) -> Self {
        let dir = TempDir::new().unwrap();

        let mut config = Config::default();
        config.crawler.max_stories_per_run = 10;
        config.crawler.max_chapters_per_story_per_run = ChapterBudget::Limited(3);
        config.crawler.request_timeout_ms = 5_000;
        config.crawler.retry_count = 3;
        config.crawler.retry_backoff_base_ms = 1;
        config.site.listing_url = format!("{}/danh-sach?page={{page}}", server.uri());
        config.site.listing_start_page = 1;
        config.site.listing_end_page = 1;
        config.site.chapter_url = "{story_url}/chapter-{n}".to_string();
        config.site.stories = stories;
        config.state = StateConfig {
            backend: StateBackend::Sqlite,
            path: dir.path().join("state.db").to_string_lossy().into_owned(),
        };
        config.sink = SinkConfig {
            kind: SinkKind::File,
            path: Some(dir.path().join("stories.json").to_string_lossy().into_owned()),
            endpoint: None,
            api_key_env: None,
        };

        Self { dir, config }
    }

    pub fn state_path(&self) -> PathBuf {
        PathBuf::from(&self.config.state.path)
    }

    pub fn sink_path(&self) -> PathBuf {
        PathBuf::from(self.config.sink.path.clone().unwrap())
    }

    pub fn sqlite_store(&self) -> Arc<dyn CrawlStateStore> {
        Arc::new(SqliteStateStore::new(&self.state_path()).unwrap())
    }

    pub fn file_sink(&self) -> Arc<JsonFileSink> {
        Arc::new(JsonFileSink::new(self.sink_path()))
    }

    pub fn coordinator(
        &self,
        store: Arc<dyn CrawlStateStore>,
        sink: Arc<dyn Sink>,
        cancel: CancellationToken,
    ) -> Coordinator {
        let fetcher = Arc::new(HttpFetcher::new(&self.config.crawler).unwrap());
        let parser = Arc::new(SelectorParser::new(&self.config.site.selectors).unwrap());
        Coordinator::new(self.config.clone(), fetcher, parser, store, sink, cancel)
            .with_retry_policy(RetryPolicy::new(
                self.config.crawler.retry_count,
                Duration::from_millis(1),
            ))
    }
}

/// Sequence numbers stored for a story in the JSON sink file
pub fn sink_chapters(sink: &JsonFileSink, story_id: &str) -> Vec<u32> {
    sink.load()
        .unwrap()
        .get(story_id)
        .map(|story| story.chapters.iter().map(|c| c.sequence_number).collect())
        .unwrap_or_default()
}

pub async fn highest(store: &dyn CrawlStateStore, story_id: &str) -> Option<u32> {
    store
        .get(story_id)
        .await
        .unwrap()
        .map(|p| p.highest_completed_sequence_number)
}
