//! Configuration module for Unfurl
//!
//! This module handles locating, loading, parsing, and validating TOML
//! configuration files.
//!
//! # Example
//!
//! ```no_run
//! use unfurl::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("unfurl.toml")).unwrap();
//! println!("Crawler will wait {}s between rounds", config.crawler.period);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlOverrides, CrawlerConfig, FetcherConfig, StorageConfig, TargetEntry,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_config, prepare_storage_dir,
    resolve_config, LoadedConfig, Locations, CONFIG_ENV, DATABASE_ENV,
};
