//! URL handling module for Unfurl
//!
//! Targets are keyed by a normalized form of their URL: surrounding
//! whitespace and trailing slashes are removed, nothing else changes.

mod normalize;

pub use normalize::{normalize_resource_id, parse_target_url};
