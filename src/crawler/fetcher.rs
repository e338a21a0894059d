//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building HTTP clients with the configured user agent and timeout
//! - GET requests to fetch page content
//! - Mapping every kind of failure to "not loaded"

use crate::config::FetcherConfig;
use crate::crawler::parser::extract_links;
use crate::crawler::LinkFilter;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use std::time::{Duration, Instant};

/// Result of a fetch operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchResult {
    /// The page loaded; links that passed the filter, in document order
    Success { links: Vec<String> },

    /// The page could not be loaded (network error, bad status, not HTML, ...)
    Failed { reason: String },
}

impl FetchResult {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// Source of page links for the crawler
///
/// Implementations are shared by every worker thread.
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns the links that pass `filter`
    fn fetch(&self, url: &str, filter: &LinkFilter) -> FetchResult;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.timeout_secs.min(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Fetcher backed by a blocking reqwest client
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: build_http_client(config)?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn load(&self, url: &str) -> Result<String, String> {
        let response = self.client.get(url).send().map_err(describe_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("HTTP {}", status.as_u16()));
        }

        // A missing Content-Type is given the benefit of the doubt
        if let Some(content_type) = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
        {
            if !content_type.contains("html") {
                return Err(format!("Expected HTML, got {}", content_type));
            }
        }

        let body = response.text().map_err(describe_error)?;
        if body.trim().is_empty() {
            return Err("Empty response body".to_string());
        }

        Ok(body)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &str, filter: &LinkFilter) -> FetchResult {
        tracing::debug!("Fetching page: {}", url);
        let started = Instant::now();

        let result = match self.load(url) {
            Ok(body) => FetchResult::Success {
                links: extract_links(&body, filter),
            },
            Err(reason) => FetchResult::Failed { reason },
        };

        tracing::debug!("Fetching {} took {:.3} seconds", url, started.elapsed().as_secs_f64());
        result
    }
}

fn describe_error(e: reqwest::Error) -> String {
    if e.is_timeout() {
        "Request timeout".to_string()
    } else if e.is_connect() {
        format!("Connection failed: {}", e)
    } else {
        e.to_string()
    }
}
