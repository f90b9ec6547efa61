//! Configuration module for Manga Tracker
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, plus `MANGA_TRACKER_*` environment overrides.
//!
//! # Example
//!
//! ```no_run
//! use manga_tracker::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("tracker.toml")).unwrap();
//! println!("Chapter budget: {}", config.crawler.max_chapters_per_story_per_run);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ChapterBudget, Config, CrawlerConfig, OutputConfig, SelectorConfig, SinkConfig, SinkKind,
    SiteConfig, StateBackend, StateConfig,
};

// Re-export parser functions
pub use parser::{
    apply_env_overrides, compute_config_hash, effective_config_hash, load_config,
    load_config_from_env, load_config_from_str, load_config_with_hash, ENV_OVERRIDES, ENV_PREFIX,
};
pub use validation::validate;
