//! Database schema definitions
//!
//! This module contains the SQL schema for the Unfurl snapshot database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- One row per stored (changed) snapshot; id is the ordering key
CREATE TABLE IF NOT EXISTS snapshots (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    filter TEXT NOT NULL,
    created_at TEXT NOT NULL,
    digest TEXT NOT NULL,
    data BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_snapshots_resource ON snapshots(url, filter, id);
CREATE INDEX IF NOT EXISTS idx_snapshots_digest ON snapshots(url, filter, digest);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
