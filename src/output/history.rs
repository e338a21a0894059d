//! Snapshot history listing
//!
//! This module loads the stored snapshots of one resource and formats them
//! as a table for the `history` command.

use crate::storage::SnapshotStore;
use crate::UnfurlError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::HashMap;

/// Digest characters shown per entry
const SHORT_DIGEST_LEN: usize = 12;

/// One stored snapshot as shown in a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// Recency offset within this filter's history, as `diff` takes it
    /// (0 is the latest)
    pub offset: usize,
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub filter_pattern: String,
    pub link_count: usize,
    pub digest: String,
}

/// Newest-first view of a resource's stored snapshots
#[derive(Debug, Clone)]
pub struct ResourceHistory {
    pub resource_id: String,

    /// Every stored snapshot, not just the listed ones
    pub total: u64,

    pub entries: Vec<HistoryEntry>,
}

/// Loads up to `limit` of the most recent snapshots of `resource_id`
///
/// # Arguments
///
/// * `store` - The snapshot store to query
/// * `resource_id` - Normalized resource identity
/// * `filter_pattern` - Restrict to one filter, or `None` for all
/// * `limit` - Maximum number of entries
///
/// # Returns
///
/// * `Ok(ResourceHistory)` - The listing, possibly empty
/// * `Err(UnfurlError)` - Failed to query the store
pub fn load_history(
    store: &dyn SnapshotStore,
    resource_id: &str,
    filter_pattern: Option<&str>,
    limit: usize,
) -> Result<ResourceHistory, UnfurlError> {
    let total = store.count(resource_id, filter_pattern)?;

    let mut seen_per_filter: HashMap<String, usize> = HashMap::new();
    let entries = store
        .history(resource_id, filter_pattern, limit)?
        .into_iter()
        .map(|stored| {
            let seen = seen_per_filter
                .entry(stored.filter_pattern().to_string())
                .or_insert(0);
            let offset = *seen;
            *seen += 1;

            HistoryEntry {
                offset,
                id: stored.id,
                created_at: stored.created_at(),
                filter_pattern: stored.filter_pattern().to_string(),
                link_count: stored.links().len(),
                digest: stored.digest().to_string(),
            }
        })
        .collect();

    Ok(ResourceHistory {
        resource_id: resource_id.to_string(),
        total,
        entries,
    })
}

/// Formats a history listing
pub fn format_history(history: &ResourceHistory) -> String {
    let mut out = format!("=== History for {} ===\n\n", history.resource_id);

    if history.entries.is_empty() {
        out.push_str("  No snapshots stored\n");
        return out;
    }

    out.push_str(&format!(
        "  {:>6}  {:>6}  {:<27}  {:>6}  {:<12}  {}\n",
        "Offset", "Id", "Created", "Links", "Digest", "Filter"
    ));
    for entry in &history.entries {
        let short_digest: String = entry.digest.chars().take(SHORT_DIGEST_LEN).collect();
        out.push_str(&format!(
            "  {:>6}  {:>6}  {:<27}  {:>6}  {:<12}  {}\n",
            entry.offset,
            entry.id,
            entry.created_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            entry.link_count,
            short_digest,
            entry.filter_pattern
        ));
    }

    out.push_str(&format!(
        "\nShowing {} of {} snapshot(s)\n",
        history.entries.len(),
        history.total
    ));
    out
}

/// Prints a history listing to stdout
pub fn print_history(history: &ResourceHistory) {
    print!("{}", format_history(history));
}
