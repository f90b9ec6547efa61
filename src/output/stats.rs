//! Progress statistics from the state store
//!
//! This module backs the `--stats` command: tracked stories, their
//! resume points, and the most recent run when the backend records runs.

use crate::state::ProgressRecord;
use crate::storage::{CrawlStateStore, RunRecord, StorageResult};

/// Snapshot of everything the state store knows
#[derive(Debug, Clone)]
pub struct TrackerStatistics {
    /// Backend the statistics were read from
    pub backend: &'static str,

    /// Stories with readable progress, sorted by id
    pub stories: Vec<(String, ProgressRecord)>,

    /// Most recent run, if the backend keeps run history
    pub latest_run: Option<RunRecord>,
}

impl TrackerStatistics {
    pub fn total_chapters(&self) -> u64 {
        self.stories
            .iter()
            .map(|(_, p)| u64::from(p.highest_completed_sequence_number))
            .sum()
    }
}

/// Loads statistics from the state store
pub async fn load_statistics(store: &dyn CrawlStateStore) -> StorageResult<TrackerStatistics> {
    Ok(TrackerStatistics {
        backend: store.backend_name(),
        stories: store.list_progress().await?,
        latest_run: store.latest_run().await?,
    })
}

/// Prints statistics to stdout
pub fn print_statistics(stats: &TrackerStatistics) {
    println!("=== Tracker Statistics ({}) ===\n", stats.backend);

    println!("Overview:");
    println!("  Tracked stories: {}", stats.stories.len());
    println!("  Committed chapters: {}", stats.total_chapters());
    println!();

    if !stats.stories.is_empty() {
        println!("Stories:");
        let width = stats
            .stories
            .iter()
            .map(|(id, _)| id.len())
            .max()
            .unwrap_or(0);
        for (story_id, progress) in &stats.stories {
            println!(
                "  {:<width$}  next chapter {:>5}  last attempted {}",
                story_id,
                progress.next_sequence(),
                progress.last_attempted_at.format("%Y-%m-%d %H:%M:%S UTC"),
                width = width
            );
        }
        println!();
    }

    if let Some(run) = &stats.latest_run {
        println!("Last Run:");
        println!("  Run {} ({})", run.id, run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!(
            "  Stories done: {}, skipped: {}, chapters committed: {}",
            run.stories_done, run.stories_skipped, run.chapters_committed
        );
    }
}
