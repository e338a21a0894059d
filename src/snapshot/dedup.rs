//! Duplicate detection against stored history

use crate::snapshot::{Snapshot, StoredSnapshot};
use crate::storage::{SnapshotStore, StorageResult};
use serde::Deserialize;

/// Which stored snapshots a candidate is compared against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupPolicy {
    /// Any stored snapshot of the same resource and filter
    #[default]
    History,

    /// Only the most recent snapshot of the same resource and filter, so
    /// content that reverts to an older state is stored again
    Latest,
}

/// Result of comparing a candidate snapshot with the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupOutcome {
    /// An equivalent snapshot is already stored
    Duplicate(StoredSnapshot),

    /// Nothing equivalent is stored; the candidate should be persisted
    New,
}

impl DedupOutcome {
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }
}

/// Looks up a stored snapshot equivalent to `candidate`
///
/// Equivalence is exact: same resource, same filter pattern, same digest.
/// Creation time plays no part.
pub fn check_duplicate(
    candidate: &Snapshot,
    store: &dyn SnapshotStore,
    policy: DedupPolicy,
) -> StorageResult<DedupOutcome> {
    let found = match policy {
        DedupPolicy::Latest => store
            .most_recent(candidate.resource_id(), candidate.filter_pattern(), 0)?
            .filter(|latest| latest.digest() == candidate.digest()),
        DedupPolicy::History => store.exact_match(
            candidate.resource_id(),
            candidate.filter_pattern(),
            candidate.digest(),
        )?,
    };

    Ok(match found {
        Some(stored) => DedupOutcome::Duplicate(stored),
        None => DedupOutcome::New,
    })
}

/// Returns true if any stored snapshot for the candidate's resource and
/// filter has the same digest
pub fn is_duplicate(candidate: &Snapshot, store: &dyn SnapshotStore) -> StorageResult<bool> {
    Ok(check_duplicate(candidate, store, DedupPolicy::default())?.is_duplicate())
}
