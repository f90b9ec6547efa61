use crate::config::types::{
    Config, CrawlerConfig, SelectorConfig, SinkConfig, SinkKind, SiteConfig, StateConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_site_config(&config.site)?;
    validate_selectors(&config.site.selectors)?;
    validate_state_config(&config.state)?;
    validate_sink_config(&config.sink)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    // max_stories_per_run and the chapter budget may legitimately be 0

    if config.max_concurrent_chapter_fetches < 1 || config.max_concurrent_chapter_fetches > 32 {
        return Err(ConfigError::Validation(format!(
            "max_concurrent_chapter_fetches must be between 1 and 32, got {}",
            config.max_concurrent_chapter_fetches
        )));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.retry_count < 1 {
        return Err(ConfigError::Validation(format!(
            "retry_count must be >= 1, got {}",
            config.retry_count
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates site templates and seed stories
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if !config.listing_url.contains("{page}") {
        return Err(ConfigError::Validation(format!(
            "listing_url must contain '{{page}}', got '{}'",
            config.listing_url
        )));
    }
    validate_http_url(&config.listing_url.replace("{page}", "1"), "listing_url")?;

    if config.listing_start_page > config.listing_end_page {
        return Err(ConfigError::Validation(format!(
            "listing_start_page ({}) must not exceed listing_end_page ({})",
            config.listing_start_page, config.listing_end_page
        )));
    }

    if !config.chapter_url.contains("{n}") {
        return Err(ConfigError::Validation(format!(
            "chapter_url must contain '{{n}}', got '{}'",
            config.chapter_url
        )));
    }

    for story in &config.stories {
        validate_http_url(story, "story URL")?;
    }

    Ok(())
}

/// Every selector must compile before any page is fetched
fn validate_selectors(config: &SelectorConfig) -> Result<(), ConfigError> {
    for (name, selector) in [
        ("story-link", &config.story_link),
        ("title", &config.title),
        ("author", &config.author),
        ("description", &config.description),
        ("thumbnail", &config.thumbnail),
        ("chapter-link", &config.chapter_link),
    ]
    .into_iter()
    .chain(config.chapter_image.iter().map(|s| ("chapter-image", s)))
    {
        Selector::parse(selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("{} = '{}': {:?}", name, selector, e))
        })?;
    }

    if config.chapter_image.is_empty() {
        return Err(ConfigError::InvalidSelector(
            "chapter-image needs at least one selector".to_string(),
        ));
    }
    Ok(())
}

fn validate_state_config(config: &StateConfig) -> Result<(), ConfigError> {
    if config.path.trim().is_empty() {
        return Err(ConfigError::Validation(
            "state path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// A sink without a target is a startup error, never a runtime one
fn validate_sink_config(config: &SinkConfig) -> Result<(), ConfigError> {
    match config.kind {
        SinkKind::File => {
            let path = config.path.as_deref().unwrap_or("").trim();
            if path.is_empty() {
                return Err(ConfigError::MissingSink(
                    "file sink requires sink.path".to_string(),
                ));
            }
        }
        SinkKind::Api => {
            let endpoint = config.endpoint.as_deref().unwrap_or("").trim();
            if endpoint.is_empty() {
                return Err(ConfigError::MissingSink(
                    "api sink requires sink.endpoint".to_string(),
                ));
            }
            validate_http_url(endpoint, "sink endpoint")?;
        }
    }
    Ok(())
}

fn validate_http_url(value: &str, what: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", what, value, e)))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            what, value
        )));
    }
    Ok(())
}
