use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Main configuration structure for Manga Tracker
///
/// Every section and field has a default, so an empty file (or no file at
/// all) is a valid starting point for environment overrides.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub site: SiteConfig,
    pub state: StateConfig,
    pub sink: SinkConfig,
    pub output: OutputConfig,
}

/// Run budgets, timeouts and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Maximum number of stories taken out of discovery per run
    pub max_stories_per_run: u32,

    /// Maximum number of new chapters fetched per story per run
    pub max_chapters_per_story_per_run: ChapterBudget,

    /// Chapter fetches in flight at once for one story
    pub max_concurrent_chapter_fetches: u32,

    /// Timeout for a single request (milliseconds)
    pub request_timeout_ms: u64,

    /// Attempts per fetch before giving up (including the first)
    pub retry_count: u32,

    /// Delay before the first retry (milliseconds); doubles on each retry
    pub retry_backoff_base_ms: u64,

    /// User-Agent header sent with every request
    pub user_agent: String,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_stories_per_run: 3,
            max_chapters_per_story_per_run: ChapterBudget::Limited(10),
            max_concurrent_chapter_fetches: 5,
            request_timeout_ms: 15_000,
            retry_count: 3,
            retry_backoff_base_ms: 1_000,
            user_agent: "Mozilla/5.0 (compatible; manga-tracker/0.1)".to_string(),
        }
    }
}

/// Per-story chapter budget: a count or `"unbounded"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawChapterBudget")]
pub enum ChapterBudget {
    Limited(u32),
    Unbounded,
}

impl ChapterBudget {
    /// The budget as an optional cap (None means unbounded)
    pub fn as_option(&self) -> Option<u32> {
        match self {
            Self::Limited(n) => Some(*n),
            Self::Unbounded => None,
        }
    }
}

impl fmt::Display for ChapterBudget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Limited(n) => write!(f, "{}", n),
            Self::Unbounded => write!(f, "unbounded"),
        }
    }
}

impl FromStr for ChapterBudget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("unbounded") {
            return Ok(Self::Unbounded);
        }
        s.parse::<u32>()
            .map(Self::Limited)
            .map_err(|_| format!("expected a non-negative integer or \"unbounded\", got '{}'", s))
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawChapterBudget {
    Count(u32),
    Word(String),
}

impl TryFrom<RawChapterBudget> for ChapterBudget {
    type Error = String;

    fn try_from(raw: RawChapterBudget) -> Result<Self, Self::Error> {
        match raw {
            RawChapterBudget::Count(n) => Ok(Self::Limited(n)),
            RawChapterBudget::Word(word) => word.parse(),
        }
    }
}

/// Where stories are discovered and how their pages are laid out
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Listing page template; `{page}` is replaced with the page number
    pub listing_url: String,

    /// First listing page to scan
    pub listing_start_page: u32,

    /// Last listing page to scan (inclusive)
    pub listing_end_page: u32,

    /// Chapter page template with `{story_url}` and `{n}` placeholders
    pub chapter_url: String,

    /// Story URLs processed before anything found on listing pages
    pub stories: Vec<String>,

    pub selectors: SelectorConfig,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://nettruyen0209.com/?page={page}".to_string(),
            listing_start_page: 1,
            listing_end_page: 5,
            chapter_url: "{story_url}/chapter-{n}".to_string(),
            stories: Vec::new(),
            selectors: SelectorConfig::default(),
        }
    }
}

/// CSS selectors used to pull data out of listing, story and chapter pages
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SelectorConfig {
    pub story_link: String,
    pub title: String,
    pub author: String,
    pub description: String,
    pub thumbnail: String,
    pub chapter_link: String,

    /// Image selectors tried in order; the first one that yields images wins.
    /// A single selector string is also accepted.
    #[serde(deserialize_with = "one_or_many")]
    pub chapter_image: Vec<String>,

    /// Text that marks a chapter page as "not published yet"
    pub not_published_marker: Option<String>,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            story_link: "div.item > a".to_string(),
            title: "h1.title-detail".to_string(),
            author: "p.author a".to_string(),
            description: "div.detail-content p".to_string(),
            thumbnail: "div.detail-info img".to_string(),
            chapter_link: "div.list-chapter a".to_string(),
            chapter_image: vec![
                ".reading-detail img".to_string(),
                ".chapter-content img".to_string(),
                "div.page-chapter img".to_string(),
                ".container-chapter-reader img".to_string(),
            ],
            not_published_marker: Some("Truyện đang cập nhật".to_string()),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(selector) => vec![selector],
        OneOrMany::Many(selectors) => selectors,
    })
}

/// Crawl state persistence
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StateConfig {
    pub backend: StateBackend,

    /// Path to the SQLite database or JSON state file
    pub path: String,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            backend: StateBackend::Sqlite,
            path: "./crawl-state.db".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateBackend {
    Sqlite,
    Json,
}

/// Destination for scraped stories
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SinkConfig {
    pub kind: SinkKind,

    /// Story file written by the `file` sink
    pub path: Option<String>,

    /// Base URL of the remote API used by the `api` sink
    pub endpoint: Option<String>,

    /// Name of the environment variable holding the API bearer token
    pub api_key_env: Option<String>,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            kind: SinkKind::File,
            path: Some("stories.json".to_string()),
            endpoint: None,
            api_key_env: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    File,
    Api,
}

/// Reporting
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Optional markdown run report
    pub summary_path: Option<String>,
}
