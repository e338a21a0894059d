//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the SnapshotStore trait.

use crate::snapshot::{Snapshot, StoredSnapshot};
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{SnapshotStore, StorageError, StorageResult};
use crate::storage::MEMORY_DATABASE;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const SELECT_COLUMNS: &str = "SELECT id, url, filter, created_at, digest, data FROM snapshots";

/// SQLite storage backend
///
/// The connection sits behind a mutex, so every worker shares one store and
/// writes are serialized.
pub struct SqliteSnapshotStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteSnapshotStore {
    /// Creates a new SqliteSnapshotStore instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteSnapshotStore)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        tracing::debug!("Opened snapshot database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            location: path.display().to_string(),
        })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            location: MEMORY_DATABASE.to_string(),
        })
    }

    /// Where the database lives (a file path or `:memory:`)
    pub fn location(&self) -> &str {
        &self.location
    }

    fn lock(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }
}

/// Raw column values of one `snapshots` row
struct SnapshotRow {
    id: i64,
    url: String,
    filter: String,
    created_at: String,
    digest: String,
    data: Vec<u8>,
}

impl SnapshotRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            url: row.get(1)?,
            filter: row.get(2)?,
            created_at: row.get(3)?,
            digest: row.get(4)?,
            data: row.get(5)?,
        })
    }

    fn into_stored(self) -> StorageResult<StoredSnapshot> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| StorageError::CorruptRecord {
                id: self.id,
                message: format!("bad created_at '{}': {}", self.created_at, e),
            })?
            .with_timezone(&Utc);

        Ok(StoredSnapshot {
            id: self.id,
            snapshot: Snapshot::restore(self.url, self.filter, &self.data, self.digest, created_at),
        })
    }
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

impl SnapshotStore for SqliteSnapshotStore {
    fn most_recent(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        offset: usize,
    ) -> StorageResult<Option<StoredSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE url = ?1 AND filter = ?2 ORDER BY id DESC LIMIT 1 OFFSET ?3",
            SELECT_COLUMNS
        ))?;

        let row = stmt
            .query_row(
                params![resource_id, filter_pattern, to_i64(offset)],
                SnapshotRow::from_row,
            )
            .optional()?;

        row.map(SnapshotRow::into_stored).transpose()
    }

    fn exact_match(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        digest: &str,
    ) -> StorageResult<Option<StoredSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE url = ?1 AND filter = ?2 AND digest = ?3 ORDER BY id DESC LIMIT 1",
            SELECT_COLUMNS
        ))?;

        let row = stmt
            .query_row(
                params![resource_id, filter_pattern, digest],
                SnapshotRow::from_row,
            )
            .optional()?;

        row.map(SnapshotRow::into_stored).transpose()
    }

    fn insert(&self, snapshot: &Snapshot) -> StorageResult<StoredSnapshot> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO snapshots (url, filter, created_at, digest, data)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                snapshot.resource_id(),
                snapshot.filter_pattern(),
                snapshot
                    .created_at()
                    .to_rfc3339_opts(SecondsFormat::Nanos, true),
                snapshot.digest(),
                snapshot.blob(),
            ],
        )?;

        Ok(StoredSnapshot {
            id: conn.last_insert_rowid(),
            snapshot: snapshot.clone(),
        })
    }

    fn history(
        &self,
        resource_id: &str,
        filter_pattern: Option<&str>,
        limit: usize,
    ) -> StorageResult<Vec<StoredSnapshot>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE url = ?1 AND (?2 IS NULL OR filter = ?2) ORDER BY id DESC LIMIT ?3",
            SELECT_COLUMNS
        ))?;

        let rows = stmt
            .query_map(
                params![resource_id, filter_pattern, to_i64(limit)],
                SnapshotRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(SnapshotRow::into_stored).collect()
    }

    fn count(&self, resource_id: &str, filter_pattern: Option<&str>) -> StorageResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM snapshots WHERE url = ?1 AND (?2 IS NULL OR filter = ?2)",
            params![resource_id, filter_pattern],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
