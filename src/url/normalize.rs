use crate::UrlError;
use url::Url;

/// Normalizes a story URL so the same story always maps to the same key
///
/// # Normalization Steps
///
/// 1. Parse the URL; reject if malformed
/// 2. Only HTTP and HTTPS are accepted
/// 3. Lowercase the host
/// 4. Remove fragment (everything after #)
/// 5. Remove the query string (listing pages append paging/sort params)
/// 6. Remove trailing slashes from the path (except for root /)
///
/// # Examples
///
/// ```
/// use manga_tracker::url::normalize_story_url;
///
/// let url = normalize_story_url("https://Example.com/manga/one-piece/?ref=home#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/manga/one-piece");
/// ```
pub fn normalize_story_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    // Url::parse already lowercases domain hosts; IP hosts are left alone.
    url.set_fragment(None);
    url.set_query(None);

    let trimmed = url.path().trim_end_matches('/').to_string();
    if trimmed.is_empty() {
        url.set_path("/");
    } else {
        url.set_path(&trimmed);
    }

    Ok(url)
}

/// Resolves a link href against a base URL
///
/// Returns None for hrefs that can never be a page or image:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only anchors
/// - anything that is not HTTP(S) after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) => {
            if absolute_url.scheme() == "http" || absolute_url.scheme() == "https" {
                Some(absolute_url.to_string())
            } else {
                None
            }
        }
        Err(_) => None,
    }
}
