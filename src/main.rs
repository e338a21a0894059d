//! Unfurl main entry point
//!
//! This is the command-line interface for the Unfurl link-set change monitor.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use unfurl::config::{prepare_storage_dir, resolve_config, Config, CrawlOverrides, Locations};
use unfurl::crawler::{Crawler, CrawlerSettings, HttpFetcher, LinkFilter, Target};
use unfurl::diff::{Differ, DEFAULT_NEW_OFFSET, DEFAULT_OLD_OFFSET};
use unfurl::normalize_resource_id;
use unfurl::output::{load_history, print_history, print_report};
use unfurl::storage::{open_store, SqliteSnapshotStore};

/// Environment variable that turns on debug logging
const DEBUG_ENV: &str = "UNFURL_DEBUG";

/// Unfurl: watch pages for link changes
///
/// Unfurl periodically fetches a set of pages, keeps a snapshot of their
/// links whenever they change, and shows what changed between snapshots.
#[derive(Parser, Debug)]
#[command(name = "unfurl")]
#[command(version)]
#[command(about = "Watch pages for link changes", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl targets and store changed snapshots
    Crawl {
        /// Number of rounds; negative runs forever, 0 does nothing
        #[arg(long, allow_negative_numbers = true)]
        count: Option<i64>,

        /// Seconds to wait between rounds
        #[arg(long)]
        period: Option<u64>,

        /// Fetch targets one at a time on the main thread
        #[arg(long)]
        unthreaded: bool,

        /// Maximum number of worker threads
        #[arg(long)]
        max_workers: Option<usize>,

        /// Link filter for URLs given on the command line
        #[arg(long, requires = "urls")]
        filter: Option<String>,

        /// Pages to crawl instead of the configured targets
        #[arg(value_name = "URL")]
        urls: Vec<String>,
    },

    /// Show the changes between two stored snapshots
    Diff {
        url: String,

        /// Recency offset of the older snapshot
        #[arg(long, default_value_t = DEFAULT_OLD_OFFSET)]
        old: usize,

        /// Recency offset of the newer snapshot
        #[arg(long, default_value_t = DEFAULT_NEW_OFFSET)]
        new: usize,

        /// Compare snapshots taken with this filter
        #[arg(long, default_value = LinkFilter::DEFAULT_PATTERN)]
        filter: String,
    },

    /// List stored snapshots of a page
    History {
        url: String,

        /// Maximum number of snapshots to list
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Only list snapshots taken with this filter
        #[arg(long)]
        filter: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let locations = Locations::from_env();
    let loaded = resolve_config(cli.config.as_deref(), &locations)
        .context("Failed to load configuration")?;
    match (&loaded.source, &loaded.hash) {
        (Some(source), Some(hash)) => tracing::info!(
            "Configuration loaded from {} (hash: {})",
            source.display(),
            hash
        ),
        _ => tracing::info!("No configuration file found, using defaults"),
    }
    let mut config = loaded.config;

    if let Command::Crawl {
        count,
        period,
        unthreaded,
        max_workers,
        ..
    } = &cli.command
    {
        config
            .apply_overrides(&CrawlOverrides {
                count: *count,
                period: *period,
                unthreaded: *unthreaded,
                max_workers: *max_workers,
            })
            .context("Invalid command-line settings")?;
    }

    let database = locations
        .database(config.storage.database_path.as_deref())
        .context("Failed to resolve the database location")?;
    prepare_storage_dir(&database)
        .with_context(|| format!("Failed to prepare storage for {}", database))?;
    let store = Arc::new(
        open_store(&database).with_context(|| format!("Failed to open database {}", database))?,
    );
    tracing::info!("Using database {}", store.location());

    match cli.command {
        Command::Crawl { filter, urls, .. } => {
            handle_crawl(&config, store, &urls, filter.as_deref())
        }
        Command::Diff {
            url,
            old,
            new,
            filter,
        } => handle_diff(store, &url, old, new, &filter),
        Command::History { url, limit, filter } => {
            handle_history(&store, &url, limit, filter.as_deref())
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
///
/// Logs go to stderr so diff output on stdout stays clean.
fn setup_logging(verbose: u8, quiet: bool) {
    let debug_env = std::env::var(DEBUG_ENV)
        .map(|v| !v.is_empty() && v != "0")
        .unwrap_or(false);

    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 if debug_env => EnvFilter::new("unfurl=debug,info"),
            0 => EnvFilter::new("unfurl=info,warn"),
            1 => EnvFilter::new("unfurl=debug,info"),
            2 => EnvFilter::new("unfurl=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the crawl command
fn handle_crawl(
    config: &Config,
    store: Arc<SqliteSnapshotStore>,
    urls: &[String],
    filter: Option<&str>,
) -> anyhow::Result<()> {
    let targets = if urls.is_empty() {
        config.targets()?
    } else {
        let pattern = filter.unwrap_or(LinkFilter::DEFAULT_PATTERN);
        urls.iter()
            .map(|url| Target::with_filter(url, pattern))
            .collect::<Result<Vec<_>, _>>()?
    };

    if targets.is_empty() {
        bail!("No targets to crawl; add [[target]] entries to the configuration or pass URLs");
    }

    tracing::info!("Crawling {} target(s)", targets.len());
    for target in &targets {
        tracing::debug!("  {} (filter: {})", target.resource_id(), target.filter().pattern());
    }

    let fetcher = HttpFetcher::new(&config.fetcher).context("Failed to build HTTP client")?;
    let crawler = Crawler::new(
        CrawlerSettings::from_config(&config.crawler),
        Arc::new(fetcher),
        store,
    );

    let report = crawler.crawl(&targets);
    print_report(&report);
    Ok(())
}

/// Handles the diff command
fn handle_diff(
    store: Arc<SqliteSnapshotStore>,
    url: &str,
    old: usize,
    new: usize,
    filter: &str,
) -> anyhow::Result<()> {
    let resource_id = normalize_resource_id(url)?;
    let differ = Differ::new(store);
    let diff = differ.diff_filtered(&resource_id, filter, old, new)?;

    print!("{}", diff);
    Ok(())
}

/// Handles the history command
fn handle_history(
    store: &SqliteSnapshotStore,
    url: &str,
    limit: usize,
    filter: Option<&str>,
) -> anyhow::Result<()> {
    let resource_id = normalize_resource_id(url)?;
    let history = load_history(store, &resource_id, filter, limit)?;
    print_history(&history);
    Ok(())
}
