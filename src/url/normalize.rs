use crate::UrlError;
use url::Url;

/// Normalizes a target URL into its resource identity
///
/// # Normalization Steps
///
/// 1. Trim surrounding whitespace
/// 2. Parse the URL; reject if malformed, non-HTTP(S) or host-less
/// 3. Strip every trailing slash from the original spelling
///
/// The identity keeps the caller's spelling otherwise (case, query, fragment),
/// since it is also the key under which history is looked up.
///
/// # Examples
///
/// ```
/// use unfurl::url::normalize_resource_id;
///
/// let id = normalize_resource_id("https://example.com/docs//").unwrap();
/// assert_eq!(id, "https://example.com/docs");
/// ```
pub fn normalize_resource_id(url_str: &str) -> Result<String, UrlError> {
    let trimmed = url_str.trim();
    parse_target_url(trimmed)?;
    Ok(trimmed.trim_end_matches('/').to_string())
}

/// Parses a URL and checks that it can be fetched by the crawler
pub fn parse_target_url(url_str: &str) -> Result<Url, UrlError> {
    let url = Url::parse(url_str).map_err(|e| UrlError::Parse(format!("{}: {}", url_str, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost(url_str.to_string()));
    }

    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_single_trailing_slash() {
        let id = normalize_resource_id("http://a.test/").unwrap();
        assert_eq!(id, "http://a.test");
    }

    #[test]
    fn test_strip_repeated_trailing_slashes() {
        let id = normalize_resource_id("https://example.com/page///").unwrap();
        assert_eq!(id, "https://example.com/page");
    }

    #[test]
    fn test_already_normalized_is_unchanged() {
        let id = normalize_resource_id("http://a.test").unwrap();
        assert_eq!(id, "http://a.test");
    }

    #[test]
    fn test_spelling_is_preserved() {
        let id = normalize_resource_id("https://Example.com/Page?q=1").unwrap();
        assert_eq!(id, "https://Example.com/Page?q=1");
    }

    #[test]
    fn test_surrounding_whitespace_trimmed() {
        let id = normalize_resource_id("  https://example.com/  ").unwrap();
        assert_eq!(id, "https://example.com");
    }

    #[test]
    fn test_invalid_scheme() {
        let result = normalize_resource_id("ftp://example.com/file");
        assert!(matches!(result.unwrap_err(), UrlError::InvalidScheme(_)));
    }

    #[test]
    fn test_malformed_url() {
        let result = normalize_resource_id("not a url");
        assert!(matches!(result.unwrap_err(), UrlError::Parse(_)));
    }
}
