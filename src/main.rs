//! Manga Tracker main entry point
//!
//! This is the command-line interface for the incremental manga crawler.

use anyhow::Context;
use clap::Parser;
use manga_tracker::config::{
    effective_config_hash, load_config_from_env, load_config_with_hash, Config, SinkKind,
};
use manga_tracker::crawler::run_crawl;
use manga_tracker::output::{load_statistics, print_statistics};
use manga_tracker::storage::open_state_store;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Manga Tracker: an incremental manga crawler
///
/// Each run discovers stories, fetches only chapters that earlier runs have
/// not committed, and hands them to the configured sink. Progress is kept
/// per story so the next run resumes where this one stopped.
#[derive(Parser, Debug)]
#[command(name = "manga-tracker")]
#[command(version)]
#[command(about = "An incremental manga crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults plus environment if omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show tracked stories and the last run from the state store and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?
        }
        None => {
            tracing::info!("No configuration file given, using defaults");
            let config = load_config_from_env().context("Invalid configuration")?;
            (config, effective_config_hash("", |key| std::env::var(key).ok()))
        }
    };
    tracing::debug!("Configuration hash: {}", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config).await?;
    } else {
        handle_crawl(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("manga_tracker=info,warn"),
            1 => EnvFilter::new("manga_tracker=debug,info"),
            2 => EnvFilter::new("manga_tracker=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: prints the effective settings
fn handle_dry_run(config: &Config) {
    println!("=== Manga Tracker Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max stories per run: {}", config.crawler.max_stories_per_run);
    println!(
        "  Max chapters per story per run: {}",
        config.crawler.max_chapters_per_story_per_run
    );
    println!(
        "  Concurrent chapter fetches: {}",
        config.crawler.max_concurrent_chapter_fetches
    );
    println!("  Request timeout: {}ms", config.crawler.request_timeout_ms);
    println!(
        "  Retries: {} attempts, backoff base {}ms",
        config.crawler.retry_count, config.crawler.retry_backoff_base_ms
    );
    println!("  User agent: {}", config.crawler.user_agent);

    println!("\nSite:");
    println!(
        "  Listing: {} (pages {}..={})",
        config.site.listing_url, config.site.listing_start_page, config.site.listing_end_page
    );
    println!("  Chapter URL: {}", config.site.chapter_url);
    println!("  Configured stories ({}):", config.site.stories.len());
    for story in &config.site.stories {
        println!("    - {}", story);
    }

    println!("\nState:");
    println!("  Backend: {:?}", config.state.backend);
    println!("  Path: {}", config.state.path);

    println!("\nSink:");
    match config.sink.kind {
        SinkKind::File => println!(
            "  File: {}",
            config.sink.path.as_deref().unwrap_or_default()
        ),
        SinkKind::Api => {
            println!(
                "  API: {}",
                config.sink.endpoint.as_deref().unwrap_or_default()
            );
            if let Some(var) = &config.sink.api_key_env {
                println!("  Token from: ${}", var);
            }
        }
    }

    if let Some(path) = &config.output.summary_path {
        println!("\nReport: {}", path);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows progress from the state store
async fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("State store: {}\n", config.state.path);

    let store = open_state_store(&config.state).context("Failed to open state store")?;
    let stats = load_statistics(store.as_ref())
        .await
        .context("Failed to read state store")?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current step and stopping");
            signal_token.cancel();
        }
    });

    tracing::info!(
        "Budget: {} stories, {} chapters per story",
        config.crawler.max_stories_per_run,
        config.crawler.max_chapters_per_story_per_run
    );

    let summary = match run_crawl(config, config_hash, cancel).await {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            return Err(e.into());
        }
    };

    print!("{}", summary);
    Ok(())
}
