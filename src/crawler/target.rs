//! Crawl targets and link filters

use crate::url::normalize_resource_id;
use crate::UnfurlError;
use regex::Regex;

/// Selects which links of a page belong to a snapshot
///
/// Patterns use search semantics: a link matches if the pattern matches
/// anywhere in it. The default filter accepts any non-empty link.
#[derive(Debug, Clone)]
pub struct LinkFilter {
    pattern: String,
    regex: Regex,
}

impl LinkFilter {
    pub const DEFAULT_PATTERN: &'static str = ".+";

    /// Compiles a filter pattern
    pub fn new(pattern: &str) -> Result<Self, UnfurlError> {
        let regex = Regex::new(pattern).map_err(|e| UnfurlError::InvalidPattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    /// The default filter, matching any non-empty link
    pub fn any() -> Result<Self, UnfurlError> {
        Self::new(Self::DEFAULT_PATTERN)
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, link: &str) -> bool {
        !link.is_empty() && self.regex.is_match(link)
    }
}

/// One resource monitored every round
#[derive(Debug, Clone)]
pub struct Target {
    resource_id: String,
    filter: LinkFilter,
}

impl Target {
    /// Creates a target that keeps every link on the page
    pub fn new(url: &str) -> Result<Self, UnfurlError> {
        Self::with_filter(url, LinkFilter::DEFAULT_PATTERN)
    }

    /// Creates a target whose snapshots keep only links matching `pattern`
    pub fn with_filter(url: &str, pattern: &str) -> Result<Self, UnfurlError> {
        Ok(Self {
            resource_id: normalize_resource_id(url)?,
            filter: LinkFilter::new(pattern)?,
        })
    }

    /// The normalized URL, used both for fetching and as the history key
    pub fn resource_id(&self) -> &str {
        &self.resource_id
    }

    pub fn filter(&self) -> &LinkFilter {
        &self.filter
    }
}
