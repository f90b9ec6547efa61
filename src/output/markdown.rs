//! Markdown run report
//!
//! This module renders a run summary as a human-readable markdown file,
//! listing every story with its outcome and skip reason.

use crate::output::summary::RunSummary;
use crate::storage::write_atomic;
use std::path::Path;

/// Writes the markdown report for a run
///
/// # Arguments
///
/// * `output_path` - Where the report is written
/// * `summary` - The finished run summary
/// * `run_id` - Run id, when the state backend keeps run history
/// * `config_hash` - Hash of the configuration used for the run
pub fn write_markdown_report(
    output_path: &Path,
    summary: &RunSummary,
    run_id: Option<i64>,
    config_hash: &str,
) -> std::io::Result<()> {
    let markdown = format_markdown_report(summary, run_id, config_hash);
    write_atomic(output_path, markdown.as_bytes())
}

/// Formats a run summary as markdown
pub fn format_markdown_report(
    summary: &RunSummary,
    run_id: Option<i64>,
    config_hash: &str,
) -> String {
    let mut md = String::new();

    md.push_str("# Manga Tracker Run Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    if let Some(id) = run_id {
        md.push_str(&format!("- **Run ID**: {}\n", id));
    }
    md.push_str(&format!("- **Started**: {}\n", summary.started_at.to_rfc3339()));
    if let Some(finished) = summary.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = summary.duration_seconds() {
        md.push_str(&format!("- **Duration**: {} seconds\n", duration));
    }
    md.push_str(&format!(
        "- **Status**: {}\n",
        if summary.cancelled {
            "interrupted"
        } else {
            "completed"
        }
    ));
    md.push_str(&format!("- **Config Hash**: {}\n\n", config_hash));

    // Totals
    md.push_str("## Totals\n\n");
    md.push_str(&format!(
        "- **Stories Done**: {}\n",
        summary.stories_done().len()
    ));
    md.push_str(&format!(
        "- **Stories Skipped**: {}\n",
        summary.stories_skipped().len()
    ));
    md.push_str(&format!(
        "- **Chapters Committed**: {}\n\n",
        summary.chapters_committed()
    ));

    if summary.outcomes.is_empty() {
        md.push_str("No stories were processed.\n");
        return md;
    }

    md.push_str("## Stories\n\n");
    md.push_str("| Story | Outcome | New Chapters | Highest Chapter |\n");
    md.push_str("|-------|---------|--------------|-----------------|\n");
    for outcome in &summary.outcomes {
        let result = match outcome.skip_reason {
            Some(reason) => format!("skipped ({})", reason),
            None => "done".to_string(),
        };
        let highest = outcome
            .highest_completed
            .map_or_else(|| "-".to_string(), |n| n.to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {} |\n",
            outcome.story_id, result, outcome.chapters_committed, highest
        ));
    }

    md
}
