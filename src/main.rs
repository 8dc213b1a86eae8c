//! Movie-Catalog main entry point
//!
//! This is the command-line interface for the Movie-Catalog crawler and API.

use anyhow::Context;
use clap::{Parser, ValueEnum};
use movie_catalog::api::{self, AppState};
use movie_catalog::config::{load_effective_config, Config};
use movie_catalog::query::QueryService;
use movie_catalog::schedule::Scheduler;
use movie_catalog::storage::{self, SqliteStorage};
use movie_catalog::{CrawlService, Pipeline, TriggerOutcome};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Movie-Catalog: an incremental movie catalog crawler
///
/// Mirrors an upstream movie listing into a local SQLite catalog on a
/// schedule, fetches per-title details, and serves the catalog over HTTP.
#[derive(Parser, Debug)]
#[command(name = "movie-catalog")]
#[command(version)]
#[command(about = "An incremental movie catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults and environment only if omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without starting
    #[arg(long, conflicts_with_all = ["stats", "once"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "once"])]
    stats: bool,

    /// Run one pipeline once and exit
    #[arg(long, value_enum, value_name = "PIPELINE", conflicts_with_all = ["dry_run", "stats"])]
    once: Option<OncePipeline>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OncePipeline {
    Listing,
    Details,
}

impl From<OncePipeline> for Pipeline {
    fn from(value: OncePipeline) -> Self {
        match value {
            OncePipeline::Listing => Pipeline::Listing,
            OncePipeline::Details => Pipeline::Detail,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    match &cli.config {
        Some(path) => tracing::info!("Loading configuration from: {}", path.display()),
        None => tracing::info!("No configuration file given, using defaults and environment"),
    }
    let (config, config_hash) = load_effective_config(cli.config.as_deref())
        .context("Failed to load configuration")?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(pipeline) = cli.once {
        handle_once(config, config_hash, pipeline.into()).await?;
    } else {
        handle_serve(config, config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise the level follows the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) if !quiet && verbose == 0 => filter,
        _ if quiet => EnvFilter::new("error"),
        _ => match verbose {
            0 => EnvFilter::new("movie_catalog=info,tower_http=info,warn"),
            1 => EnvFilter::new("movie_catalog=debug,tower_http=debug,info"),
            2 => EnvFilter::new("movie_catalog=trace,debug"),
            _ => EnvFilter::new("trace"),
        },
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Movie-Catalog Dry Run ===\n");

    println!("Upstream:");
    println!("  Base URL: {}", config.upstream.base_url);
    println!("  Listing path: {}", config.upstream.listing_path);
    println!("  Detail path: {}", config.upstream.detail_path);
    println!("  Timeout: {}ms", config.upstream.timeout_ms);
    println!("  User agent: {}", config.upstream.user_agent);

    println!("\nRetry:");
    println!("  Max attempts: {}", config.retry.max_attempts);
    println!("  Base delay: {}ms", config.retry.base_delay_ms);

    println!("\nCrawl:");
    println!("  Detail throttle: {}ms", config.crawl.detail_throttle_ms);
    match config.crawl.listing_max_pages {
        Some(pages) => println!("  Listing page cap: {}", pages),
        None => println!("  Listing page cap: none"),
    }

    println!("\nSchedule:");
    println!("  Listing: {}", config.schedule.listing_cron);
    println!("  Detail: {}", config.schedule.detail_cron);
    println!("  Run on startup: {}", config.schedule.run_on_startup);

    println!("\nStorage:");
    println!("  Database: {}", config.database.path);

    println!("\nServer:");
    println!("  Bind address: {}", config.server.bind_address());
    println!("  Cache TTL: {}s", config.server.cache_ttl_secs);
    println!("  Cache capacity: {}", config.server.cache_max_entries);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use movie_catalog::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.database.path);

    let storage = SqliteStorage::new(Path::new(&config.database.path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

fn open_crawl_service(config: Config, config_hash: String) -> anyhow::Result<CrawlService> {
    let storage = storage::open_shared(Path::new(&config.database.path))
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    let crawl = CrawlService::new(config, config_hash, storage)?;
    crawl.recover_interrupted_runs()?;
    Ok(crawl)
}

/// Handles the --once mode: runs a single pipeline and exits
async fn handle_once(config: Config, config_hash: String, pipeline: Pipeline) -> anyhow::Result<()> {
    let crawl = open_crawl_service(config, config_hash)?;

    match crawl.trigger_manually(pipeline).await? {
        TriggerOutcome::Completed(report) => {
            println!(
                "{} run #{}: attempted {}, succeeded {}, failed {}, skipped {}",
                report.pipeline,
                report.run_id,
                report.counters.attempted,
                report.counters.succeeded,
                report.counters.failed,
                report.counters.skipped
            );
        }
        TriggerOutcome::AlreadyRunning => println!("{} crawl already running", pipeline),
    }

    Ok(())
}

/// Handles the default mode: scheduler plus API server until Ctrl-C
async fn handle_serve(config: Config, config_hash: String) -> anyhow::Result<()> {
    let schedule = config.schedule.clone();
    let bind_address = config.server.bind_address();
    let cache_ttl = config.server.cache_ttl();
    let cache_capacity = config.server.cache_max_entries;

    let crawl = open_crawl_service(config, config_hash)?;
    let query = QueryService::new(crawl.storage().clone(), cache_ttl, cache_capacity);

    let mut scheduler = Scheduler::new(crawl.clone());
    scheduler.start(&schedule)?;

    let router = api::create_router(AppState::new(query, crawl));
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
        }
        tracing::info!("Shutdown signal received");
    };

    let served = api::serve(router, &bind_address, shutdown).await;
    scheduler.shutdown();
    served.with_context(|| format!("API server on {} failed", bind_address))?;

    tracing::info!("Shut down cleanly");
    Ok(())
}
