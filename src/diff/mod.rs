//! Differ for stored snapshots
//!
//! Resolves two snapshots of one resource by recency offset and renders the
//! change between their link sets as a unified diff.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unfurl::diff::Differ;
//! use unfurl::storage::open_store;
//!
//! let store = Arc::new(open_store(":memory:").unwrap());
//! let differ = Differ::new(store);
//! print!("{}", differ.diff("https://example.com", 1, 0).unwrap());
//! ```

mod unified;

pub use unified::{unified_diff, DiffSide, DEFAULT_CONTEXT};

use crate::crawler::LinkFilter;
use crate::snapshot::StoredSnapshot;
use crate::storage::SnapshotStore;
use crate::UnfurlError;
use chrono::SecondsFormat;
use std::sync::Arc;

/// Offset of the older side when none is given (the previous snapshot)
pub const DEFAULT_OLD_OFFSET: usize = 1;

/// Offset of the newer side when none is given (the latest snapshot)
pub const DEFAULT_NEW_OFFSET: usize = 0;

/// Renders diffs between stored snapshots
pub struct Differ {
    store: Arc<dyn SnapshotStore>,
    context: usize,
}

impl Differ {
    pub fn new(store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            store,
            context: DEFAULT_CONTEXT,
        }
    }

    /// Sets the number of unchanged lines shown around each change
    pub fn with_context(mut self, context: usize) -> Self {
        self.context = context;
        self
    }

    /// Diffs two snapshots of `resource_id` taken with the default filter
    ///
    /// Snapshots taken with other filters are a separate history and never
    /// take part; see [`Differ::diff_filtered`] for those. Offset 0 is the most recent snapshot, 1 the one before it, and so on.
    /// When only one side exists it is compared with itself, giving a diff
    /// with headers and no hunks.
    ///
    /// # Returns
    ///
    /// * `Ok(String)` - Unified diff text ending in a single newline
    /// * `Err(UnfurlError::NoSuchRecord)` - Neither offset resolves
    pub fn diff(
        &self,
        resource_id: &str,
        old_offset: usize,
        new_offset: usize,
    ) -> Result<String, UnfurlError> {
        self.diff_filtered(resource_id, LinkFilter::DEFAULT_PATTERN, old_offset, new_offset)
    }

    /// Like [`Differ::diff`] but over the snapshots taken with `filter_pattern`
    pub fn diff_filtered(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        old_offset: usize,
        new_offset: usize,
    ) -> Result<String, UnfurlError> {
        let (old, new) = self.resolve(resource_id, filter_pattern, old_offset, new_offset)?;
        tracing::debug!(
            "Diffing {} snapshot {} against {}",
            resource_id,
            old.id,
            new.id
        );

        let old_timestamp = old.created_at().to_rfc3339_opts(SecondsFormat::Micros, true);
        let new_timestamp = new.created_at().to_rfc3339_opts(SecondsFormat::Micros, true);

        Ok(unified_diff(
            DiffSide {
                label: old.resource_id(),
                timestamp: &old_timestamp,
                lines: old.links(),
            },
            DiffSide {
                label: new.resource_id(),
                timestamp: &new_timestamp,
                lines: new.links(),
            },
            self.context,
        ))
    }

    fn resolve(
        &self,
        resource_id: &str,
        filter_pattern: &str,
        old_offset: usize,
        new_offset: usize,
    ) -> Result<(StoredSnapshot, StoredSnapshot), UnfurlError> {
        let old = self
            .store
            .most_recent(resource_id, filter_pattern, old_offset)?;
        let new = self
            .store
            .most_recent(resource_id, filter_pattern, new_offset)?;

        match (old, new) {
            (Some(old), Some(new)) => Ok((old, new)),
            (None, Some(new)) => Ok((new.clone(), new)),
            (Some(old), None) => Ok((old.clone(), old)),
            (None, None) => Err(UnfurlError::NoSuchRecord {
                resource_id: resource_id.to_string(),
            }),
        }
    }
}
