//! Unfurl: a link-set change monitor
//!
//! This crate periodically fetches a fixed set of pages, reduces each one to a
//! content-addressed snapshot of its matching links, stores only snapshots that
//! changed, and renders unified diffs between any two stored snapshots.

pub mod config;
pub mod crawler;
pub mod diff;
pub mod output;
pub mod snapshot;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Unfurl operations
#[derive(Debug, Error)]
pub enum UnfurlError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("Invalid link filter '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Worker pool error: {0}")]
    Executor(#[from] crawler::ExecutorError),

    #[error("No stored snapshot for {resource_id}")]
    NoSuchRecord { resource_id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(String),

    #[error("Cannot determine a home directory for the default {0}")]
    NoHomeDir(&'static str),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL: {0}")]
    MissingHost(String),
}

/// Result type alias for Unfurl operations
pub type Result<T> = std::result::Result<T, UnfurlError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{
    CrawlReport, Crawler, CrawlerSettings, ExecutionMode, Executor, FetchResult, Fetcher,
    HttpFetcher, LinkFilter, StopHandle, Target,
};
pub use diff::Differ;
pub use snapshot::{build_snapshot, is_duplicate, DedupPolicy, Snapshot, StoredSnapshot};
pub use storage::{SnapshotStore, SqliteSnapshotStore};
pub use url::normalize_resource_id;
