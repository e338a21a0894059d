//! Crawler module for periodic link snapshots
//!
//! This module contains the core crawling logic, including:
//! - Crawl targets and their link filters
//! - HTTP fetching and link extraction
//! - The bounded worker pool each round runs on
//! - Round scheduling, dedup and persistence

mod coordinator;
mod executor;
mod fetcher;
mod parser;
mod target;

pub use coordinator::{
    crawl_target, persist_snapshot, CrawlReport, Crawler, CrawlerSettings, PersistOutcome,
    StopHandle,
};
pub use executor::{
    ExecutionMode, Executor, ExecutorError, ShutdownHandle, WorkSummary, DEFAULT_IDLE_GRACE,
};
pub use fetcher::{build_http_client, FetchResult, Fetcher, HttpFetcher};
pub use parser::extract_links;
pub use target::{LinkFilter, Target};
