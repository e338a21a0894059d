//! Storage module for persisting snapshots
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Snapshot insertion
//! - Recency-offset and exact-digest lookups used by dedup and diffing

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteSnapshotStore;
pub use traits::{SnapshotStore, StorageError, StorageResult};

use std::path::Path;

/// Database location meaning "keep everything in memory"
pub const MEMORY_DATABASE: &str = ":memory:";

/// Opens the snapshot store at `location`
///
/// `":memory:"` opens a private in-memory database.
///
/// # Returns
///
/// * `Ok(SqliteSnapshotStore)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to open or initialize the database
pub fn open_store(location: &str) -> StorageResult<SqliteSnapshotStore> {
    if location == MEMORY_DATABASE {
        SqliteSnapshotStore::new_in_memory()
    } else {
        SqliteSnapshotStore::new(Path::new(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_memory_store() {
        let store = open_store(MEMORY_DATABASE).unwrap();
        assert_eq!(store.location(), MEMORY_DATABASE);
    }

    #[test]
    fn test_open_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.sqlite3");
        let store = open_store(path.to_str().unwrap()).unwrap();
        assert!(path.exists());
        assert_eq!(store.location(), path.display().to_string());
    }
}
