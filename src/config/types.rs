use crate::config::validation::validate;
use crate::crawler::{LinkFilter, Target};
use crate::snapshot::DedupPolicy;
use crate::{ConfigError, UnfurlError};
use serde::Deserialize;

/// Main configuration structure for Unfurl
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawler: CrawlerConfig,
    pub fetcher: FetcherConfig,
    pub storage: StorageConfig,

    /// Monitored pages, one `[[target]]` table each
    #[serde(rename = "target")]
    pub targets: Vec<TargetEntry>,
}

impl Config {
    /// Builds crawl targets from the `[[target]]` entries
    pub fn targets(&self) -> Result<Vec<Target>, UnfurlError> {
        self.targets.iter().map(TargetEntry::to_target).collect()
    }

    /// Layers command-line crawl settings over the loaded ones
    ///
    /// The result is validated again, so an override cannot produce a
    /// configuration the file itself would have been rejected for.
    pub fn apply_overrides(&mut self, overrides: &CrawlOverrides) -> Result<(), ConfigError> {
        if let Some(count) = overrides.count {
            self.crawler.count = count;
        }
        if let Some(period) = overrides.period {
            self.crawler.period = period;
        }
        if overrides.unthreaded {
            self.crawler.threaded = false;
        }
        if let Some(max_workers) = overrides.max_workers {
            self.crawler.max_workers = max_workers;
        }

        validate(self)
    }
}

/// Crawl settings given on the command line
#[derive(Debug, Clone, Default)]
pub struct CrawlOverrides {
    pub count: Option<i64>,
    pub period: Option<u64>,
    pub unthreaded: bool,
    pub max_workers: Option<usize>,
}

/// Round scheduling and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seconds to sleep between rounds
    pub period: u64,

    /// Number of rounds; negative is unbounded, zero disables crawling
    pub count: i64,

    /// Run each round on worker threads
    pub threaded: bool,

    /// Maximum number of worker threads per round
    pub max_workers: usize,

    /// How long an idle worker waits for more work (milliseconds)
    pub idle_grace_ms: u64,

    pub dedup: DedupPolicy,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            period: 3600,
            count: -1,
            threaded: true,
            max_workers: 4,
            idle_grace_ms: 500,
            dedup: DedupPolicy::History,
        }
    }
}

/// HTTP client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FetcherConfig {
    pub user_agent: String,

    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: format!("unfurl/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

/// Snapshot database configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct StorageConfig {
    /// Path to the SQLite database, or `:memory:`
    ///
    /// When unset the location is resolved from the environment.
    pub database_path: Option<String>,
}

/// One monitored page
#[derive(Debug, Clone, Deserialize)]
pub struct TargetEntry {
    pub url: String,

    /// Link filter pattern; defaults to any non-empty link
    #[serde(default)]
    pub filter: Option<String>,
}

impl TargetEntry {
    pub fn filter_pattern(&self) -> &str {
        self.filter.as_deref().unwrap_or(LinkFilter::DEFAULT_PATTERN)
    }

    pub fn to_target(&self) -> Result<Target, UnfurlError> {
        Target::with_filter(&self.url, self.filter_pattern())
    }
}
