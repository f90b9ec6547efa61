//! HTML parser for listing, story and chapter pages
//!
//! This module turns fetched pages into:
//! - Story URLs from a listing page
//! - A story skeleton (metadata, no chapters) plus the latest advertised chapter
//! - The image URLs of a chapter, or the not-found sentinel
//!
//! All selectors come from configuration and are compiled once.

use crate::config::SelectorConfig;
use crate::model::StoryRecord;
use crate::url::{normalize_story_url, resolve_link};
use crate::ConfigError;
use scraper::{ElementRef, Html, Selector};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use url::Url;

/// Image URLs containing any of these are site chrome, not chapter pages
const IMAGE_NOISE: &[&str] = &["/logo", "favicon", "icon"];

/// Errors from interpreting a fetched page
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{url} does not look like a story page")]
    NotAStoryPage { url: String },
}

/// Story metadata plus what the story page advertises about its chapters
#[derive(Debug, Clone, PartialEq)]
pub struct StorySkeleton {
    /// Metadata only; `chapters` is empty
    pub record: StoryRecord,

    /// Highest chapter number linked from the story page, if any
    pub latest_sequence: Option<u32>,

    /// Link text of each listed chapter, keyed by sequence number
    pub labels: BTreeMap<u32, String>,
}

/// Outcome of parsing a chapter page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterPage {
    /// Absolute image URLs in reading order; never empty
    Images(Vec<String>),

    /// The chapter does not exist yet
    NotFound,
}

/// Opaque page interpretation used by the coordinator
pub trait SiteParser: Send + Sync {
    /// Extracts story URLs from a listing page
    fn parse_listing(&self, html: &str, base_url: &Url) -> Vec<String>;

    /// Extracts story metadata from a story page
    fn parse_story(
        &self,
        story_id: &str,
        html: &str,
        base_url: &Url,
    ) -> Result<StorySkeleton, ParseError>;

    /// Extracts chapter images; zero images is the not-found sentinel
    fn parse_chapter(&self, html: &str, base_url: &Url) -> ChapterPage;
}

/// `SiteParser` driven by CSS selectors from configuration
#[derive(Debug, Clone)]
pub struct SelectorParser {
    story_link: Selector,
    title: Selector,
    author: Selector,
    description: Selector,
    thumbnail: Selector,
    chapter_link: Selector,
    chapter_images: Vec<Selector>,
    not_published_marker: Option<String>,
}

fn compile(name: &str, selector: &str) -> Result<Selector, ConfigError> {
    Selector::parse(selector)
        .map_err(|e| ConfigError::InvalidSelector(format!("{} = '{}': {:?}", name, selector, e)))
}

impl SelectorParser {
    pub fn new(config: &SelectorConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            story_link: compile("story-link", &config.story_link)?,
            title: compile("title", &config.title)?,
            author: compile("author", &config.author)?,
            description: compile("description", &config.description)?,
            thumbnail: compile("thumbnail", &config.thumbnail)?,
            chapter_link: compile("chapter-link", &config.chapter_link)?,
            chapter_images: config
                .chapter_image
                .iter()
                .map(|selector| compile("chapter-image", selector))
                .collect::<Result<_, _>>()?,
            not_published_marker: config
                .not_published_marker
                .clone()
                .filter(|m| !m.trim().is_empty()),
        })
    }
}

/// Collapsed text of the first element matching `selector`
fn first_text(document: &Html, selector: &Selector) -> Option<String> {
    document
        .select(selector)
        .map(element_text)
        .find(|text| !text.is_empty())
}

fn element_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Image source, preferring lazy-load attributes over placeholder `src`s
fn image_source<'a>(element: &ElementRef<'a>) -> Option<&'a str> {
    ["data-original", "data-src", "src"]
        .iter()
        .filter_map(|attr| element.value().attr(attr))
        .map(str::trim)
        .find(|value| !value.is_empty())
}

/// Chapter number from a chapter link: link text first, then the URL slug
///
/// "Chapter 12" and ".../chapter-12" both give 12.
pub fn chapter_number(href: &str, text: &str) -> Option<u32> {
    first_number(text).or_else(|| {
        let slug = href
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        last_number(slug)
    })
}

fn digit_runs(s: &str) -> impl Iterator<Item = u32> + '_ {
    s.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .filter_map(|run| run.parse().ok())
}

fn first_number(s: &str) -> Option<u32> {
    digit_runs(s).next()
}

fn last_number(s: &str) -> Option<u32> {
    digit_runs(s).last()
}

impl SiteParser for SelectorParser {
    fn parse_listing(&self, html: &str, base_url: &Url) -> Vec<String> {
        let document = Html::parse_document(html);
        let mut seen = HashSet::new();
        let mut stories = Vec::new();

        for link in document.select(&self.story_link) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            let Some(absolute) = resolve_link(href, base_url) else {
                continue;
            };
            match normalize_story_url(&absolute) {
                Ok(url) => {
                    if seen.insert(url.to_string()) {
                        stories.push(url.to_string());
                    }
                }
                Err(e) => tracing::debug!("Ignoring listing link {}: {}", absolute, e),
            }
        }

        stories
    }

    fn parse_story(
        &self,
        story_id: &str,
        html: &str,
        base_url: &Url,
    ) -> Result<StorySkeleton, ParseError> {
        let document = Html::parse_document(html);

        let title = first_text(&document, &self.title);

        let mut latest_sequence = None;
        let mut labels = BTreeMap::new();
        for link in document.select(&self.chapter_link) {
            let href = link.value().attr("href").unwrap_or_default();
            let text = element_text(link);
            let Some(n) = chapter_number(href, &text) else {
                continue;
            };
            latest_sequence = latest_sequence.max(Some(n));
            if !text.is_empty() {
                labels.entry(n).or_insert(text);
            }
        }

        if title.is_none() && latest_sequence.is_none() {
            return Err(ParseError::NotAStoryPage {
                url: base_url.to_string(),
            });
        }

        let mut record = StoryRecord::new(story_id);
        record.title = title;
        record.author = first_text(&document, &self.author);
        record.description = first_text(&document, &self.description);
        record.thumbnail_url = document
            .select(&self.thumbnail)
            .filter_map(|img| image_source(&img))
            .find_map(|src| resolve_link(src, base_url));

        Ok(StorySkeleton {
            record,
            latest_sequence,
            labels,
        })
    }

    fn parse_chapter(&self, html: &str, base_url: &Url) -> ChapterPage {
        let document = Html::parse_document(html);

        if let Some(marker) = &self.not_published_marker {
            let body_text: String = document.root_element().text().collect();
            if body_text.contains(marker.as_str()) {
                return ChapterPage::NotFound;
            }
        }

        self.chapter_images
            .iter()
            .map(|selector| chapter_images(&document, selector, base_url))
            .find(|images| !images.is_empty())
            .map_or(ChapterPage::NotFound, ChapterPage::Images)
    }
}

/// Deduplicated page images under one selector, site chrome removed
fn chapter_images(document: &Html, selector: &Selector, base_url: &Url) -> Vec<String> {
    let mut seen = HashSet::new();
    document
        .select(selector)
        .filter_map(|img| image_source(&img))
        .filter_map(|src| resolve_link(src, base_url))
        .filter(|url| !IMAGE_NOISE.iter().any(|noise| url.contains(noise)))
        .filter(|url| seen.insert(url.clone()))
        .collect()
}
