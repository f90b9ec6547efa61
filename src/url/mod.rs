//! URL handling module
//!
//! Story URL normalization, story id derivation, chapter URL templating and
//! link resolution.

mod normalize;

pub use normalize::{normalize_story_url, resolve_link};

use crate::UrlError;

/// Derives the stable story id from a story URL
///
/// The id is the last non-empty path segment (the slug), so
/// `https://site/manga/one-piece/` becomes `one-piece`.
///
/// # Examples
///
/// ```
/// use manga_tracker::url::story_id_from_url;
///
/// assert_eq!(story_id_from_url("https://example.com/manga/one-piece/").unwrap(), "one-piece");
/// ```
pub fn story_id_from_url(url_str: &str) -> Result<String, UrlError> {
    let url = normalize_story_url(url_str)?;
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| s.to_string())
        .ok_or_else(|| UrlError::MissingSlug(url_str.to_string()))
}

/// Builds the URL of chapter `n` from a template
///
/// `{story_url}` is replaced with the story URL (no trailing slash) and
/// `{n}` with the sequence number.
pub fn chapter_url(template: &str, story_url: &str, n: u32) -> String {
    template
        .replace("{story_url}", story_url.trim_end_matches('/'))
        .replace("{n}", &n.to_string())
}

/// Builds the URL of listing page `page` from a template containing `{page}`
pub fn listing_url(template: &str, page: u32) -> String {
    template.replace("{page}", &page.to_string())
}
