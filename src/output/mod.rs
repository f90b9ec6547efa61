//! Output module for run summaries and reports
//!
//! This module handles:
//! - The run summary every run ends with
//! - Markdown run reports
//! - Progress statistics for the `--stats` command

mod markdown;
pub mod stats;
mod summary;

pub use markdown::{format_markdown_report, write_markdown_report};
pub use stats::{load_statistics, print_statistics, TrackerStatistics};
pub use summary::{RunSummary, StoryOutcome};
