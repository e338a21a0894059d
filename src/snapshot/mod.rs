//! Snapshot model
//!
//! A snapshot is the normalized state of one monitored resource at one point
//! in time: the sorted, deduplicated set of links that matched the resource's
//! filter, plus a SHA-512 digest of that set. Snapshots are built eagerly and
//! never change afterwards.

mod dedup;

pub use dedup::{check_duplicate, is_duplicate, DedupOutcome, DedupPolicy};

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha512};
use std::collections::BTreeSet;

/// Separator used when joining links for hashing and storage.
///
/// NUL never appears in link text: HTML parsers replace it with U+FFFD.
pub const LINK_SEPARATOR: char = '\0';

/// Immutable, content-addressed view of a resource's links
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    resource_id: String,
    filter_pattern: String,
    links: Vec<String>,
    digest: String,
    created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Builds a snapshot with an explicit creation time
    pub fn with_timestamp<I, S>(
        resource_id: impl Into<String>,
        filter_pattern: impl Into<String>,
        links: I,
        created_at: DateTime<Utc>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let links = canonicalize_links(links);
        let digest = compute_digest(&links);

        Self {
            resource_id: resource_id.into(),
            filter_pattern: filter_pattern.into(),
            links,
            digest,
            created_at,
        }
    }

    /// Rebuilds a snapshot from persisted columns.
    ///
    /// The stored blob is already canonical, so the stored digest is trusted.
    pub(crate) fn restore(
        resource_id: String,
        filter_pattern: String,
        blob: &[u8],
        digest: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            resource_id,
            filter_pattern,
            links: decode_links(blob),
            digest,
            created_at,
        }
    }

    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn filter_pattern(&self) -> &str {
        &self.filter_pattern
    }

    /// Links in canonical order (deduplicated, lexicographically sorted)
    pub fn links(&self) -> &[String] {
        &self.links
    }

    /// Hex-encoded SHA-512 digest of the canonical link set
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Canonical byte representation used for storage
    pub fn blob(&self) -> Vec<u8> {
        encode_links(&self.links)
    }

    /// Returns true if both snapshots describe the same content of the same
    /// resource, regardless of when they were taken.
    pub fn same_content(&self, other: &Snapshot) -> bool {
        self.resource_id == other.resource_id
            && self.filter_pattern == other.filter_pattern
            && self.digest == other.digest
    }
}

/// A snapshot that has been persisted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSnapshot {
    /// Storage-assigned key; increases with insertion order
    pub id: i64,

    pub snapshot: Snapshot,
}

impl std::ops::Deref for StoredSnapshot {
    type Target = Snapshot;

    fn deref(&self) -> &Snapshot {
        &self.snapshot
    }
}

/// Builds a snapshot stamped with the current time
///
/// # Arguments
///
/// * `resource_id` - The normalized URL of the resource
/// * `filter_pattern` - The pattern that selected the links
/// * `links` - Links in fetch order, possibly with repeats
///
/// # Example
///
/// ```
/// use unfurl::snapshot::build_snapshot;
///
/// let a = build_snapshot("http://a.test", ".+", vec!["/y", "/x", "/y"]);
/// let b = build_snapshot("http://a.test", ".+", vec!["/x", "/y"]);
/// assert_eq!(a.links(), b.links());
/// assert_eq!(a.digest(), b.digest());
/// ```
pub fn build_snapshot<I, S>(
    resource_id: impl Into<String>,
    filter_pattern: impl Into<String>,
    links: I,
) -> Snapshot
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Snapshot::with_timestamp(resource_id, filter_pattern, links, Utc::now())
}

/// Deduplicates and sorts links; empty strings are dropped.
pub fn canonicalize_links<I, S>(links: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    links
        .into_iter()
        .map(Into::into)
        .filter(|link| !link.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Computes the hex-encoded SHA-512 digest of canonical links
pub fn compute_digest(links: &[String]) -> String {
    let mut hasher = Sha512::new();
    hasher.update(&encode_links(links));
    hex::encode(hasher.finalize())
}

fn encode_links(links: &[String]) -> Vec<u8> {
    let mut sep = [0u8; 4];
    let sep = LINK_SEPARATOR.encode_utf8(&mut sep);
    links.join(&*sep).into_bytes()
}

fn decode_links(blob: &[u8]) -> Vec<String> {
    if blob.is_empty() {
        return Vec::new();
    }

    String::from_utf8_lossy(blob)
        .split(LINK_SEPARATOR)
        .map(str::to_string)
        .collect()
}
