//! Storage traits and error types
//!
//! This module defines the trait interface for snapshot storage backends and
//! associated error types.

use crate::snapshot::{Snapshot, StoredSnapshot};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt record {id}: {message}")]
    CorruptRecord { id: i64, message: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for snapshot storage backends
///
/// A single store is shared by every crawl worker, so implementations must
/// make concurrent calls safe. Writes for different resources must not
/// interfere with each other.
///
/// Snapshots taken with different filters form separate histories. Listing
/// calls take `Option<&str>` and span every filter when given `None`; lookups
/// that feed dedup and diffing always name one filter.
pub trait SnapshotStore: Send + Sync {
    /// Gets the stored snapshot at a recency offset
    ///
    /// # Arguments
    ///
    /// * `resource_id` - The normalized resource URL
    /// * `filter_pattern` - The filter whose history to look in
    /// * `offset` - 0 for the most recent snapshot, 1 for the one before, etc.
    fn most_recent(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        offset: usize,
    ) -> StorageResult<Option<StoredSnapshot>>;

    /// Gets the most recent stored snapshot with exactly this digest
    fn exact_match(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        digest: &str,
    ) -> StorageResult<Option<StoredSnapshot>>;

    /// Persists a snapshot and returns it with its storage key
    fn insert(&self, snapshot: &Snapshot) -> StorageResult<StoredSnapshot>;

    /// Lists stored snapshots newest first, at most `limit` of them
    fn history(
        &self,
        resource_id: &str,
        filter_pattern: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<StoredSnapshot>>;

    /// Counts stored snapshots for a resource
    fn count(&self, resource_id: &str, filter_pattern: Option<&str>) -> StorageResult<u64>;
}
