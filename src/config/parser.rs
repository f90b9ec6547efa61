use crate::config::types::{ChapterBudget, Config};
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Prefix shared by every environment override
pub const ENV_PREFIX: &str = "MANGA_TRACKER_";

/// Settings that can be overridden from the environment, without the prefix
pub const ENV_OVERRIDES: &[&str] = &[
    "MAX_STORIES_PER_RUN",
    "MAX_CHAPTERS_PER_STORY_PER_RUN",
    "REQUEST_TIMEOUT_MS",
    "RETRY_COUNT",
    "RETRY_BACKOFF_BASE_MS",
    "STATE_PATH",
    "SINK_PATH",
    "SINK_ENDPOINT",
];

/// Loads, overrides and validates a configuration file
///
/// Environment overrides are read from the process environment after the
/// file is parsed.
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use manga_tracker::config::load_config;
///
/// let config = load_config(Path::new("tracker.toml")).unwrap();
/// println!("Stories per run: {}", config.crawler.max_stories_per_run);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content, |key| std::env::var(key).ok())
}

/// Builds a configuration from defaults plus the process environment
pub fn load_config_from_env() -> Result<Config, ConfigError> {
    load_config_from_str("", |key| std::env::var(key).ok())
}

/// Parses TOML content, applies overrides from `lookup` and validates
pub fn load_config_from_str<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Applies `MANGA_TRACKER_*` overrides on top of a parsed configuration
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

    if let Some(value) = get("MAX_STORIES_PER_RUN") {
        config.crawler.max_stories_per_run = parse_env("MAX_STORIES_PER_RUN", &value)?;
    }
    if let Some(value) = get("MAX_CHAPTERS_PER_STORY_PER_RUN") {
        config.crawler.max_chapters_per_story_per_run = value
            .parse::<ChapterBudget>()
            .map_err(|message| ConfigError::InvalidEnv {
                key: format!("{}MAX_CHAPTERS_PER_STORY_PER_RUN", ENV_PREFIX),
                message,
            })?;
    }
    if let Some(value) = get("REQUEST_TIMEOUT_MS") {
        config.crawler.request_timeout_ms = parse_env("REQUEST_TIMEOUT_MS", &value)?;
    }
    if let Some(value) = get("RETRY_COUNT") {
        config.crawler.retry_count = parse_env("RETRY_COUNT", &value)?;
    }
    if let Some(value) = get("RETRY_BACKOFF_BASE_MS") {
        config.crawler.retry_backoff_base_ms = parse_env("RETRY_BACKOFF_BASE_MS", &value)?;
    }
    if let Some(value) = get("STATE_PATH") {
        config.state.path = value;
    }
    if let Some(value) = get("SINK_PATH") {
        config.sink.path = Some(value);
    }
    if let Some(value) = get("SINK_ENDPOINT") {
        config.sink.endpoint = Some(value);
    }

    Ok(())
}

fn parse_env<T>(name: &str, value: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::InvalidEnv {
        key: format!("{}{}", ENV_PREFIX, name),
        message: format!("'{}': {}", value, e),
    })
}

/// Computes a SHA-256 hash of configuration content
///
/// Recorded with every run so a changed configuration is visible in the
/// run history.
pub fn compute_config_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

/// Hashes configuration content together with the overrides `lookup` supplies
///
/// Two runs from the same file but different `MANGA_TRACKER_*` values get
/// different hashes.
pub fn effective_config_hash<F>(content: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let mut effective = content.to_string();
    for name in ENV_OVERRIDES {
        let key = format!("{}{}", ENV_PREFIX, name);
        if let Some(value) = lookup(&key) {
            effective.push_str(&format!("\n{}={}", key, value));
        }
    }
    compute_config_hash(&effective)
}

/// Loads a configuration file and returns both the config and its effective hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let lookup = |key: &str| std::env::var(key).ok();
    let config = load_config_from_str(&content, lookup)?;
    Ok((config, effective_config_hash(&content, lookup)))
}
