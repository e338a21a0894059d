use crate::config::types::{Config, CrawlerConfig, FetcherConfig, StorageConfig, TargetEntry};
use crate::url::parse_target_url;
use crate::ConfigError;
use regex::Regex;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_storage_config(&config.storage)?;
    validate_targets(&config.targets)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_workers < 1 {
        return Err(ConfigError::Validation(format!(
            "max-workers must be >= 1, got {}",
            config.max_workers
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if let Some(path) = &config.database_path {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(
                "database-path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates target entries
fn validate_targets(targets: &[TargetEntry]) -> Result<(), ConfigError> {
    for entry in targets {
        parse_target_url(entry.url.trim()).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid target URL '{}': {}", entry.url, e))
        })?;

        Regex::new(entry.filter_pattern()).map_err(|e| {
            ConfigError::InvalidPattern(format!(
                "Filter '{}' for target '{}': {}",
                entry.filter_pattern(),
                entry.url,
                e
            ))
        })?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(url: &str, filter: Option<&str>) -> TargetEntry {
        TargetEntry {
            url: url.to_string(),
            filter: filter.map(str::to_string),
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.crawler.max_workers = 0;
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::Validation(_)
        ));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let mut config = Config::default();
        config.fetcher.timeout_secs = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_blank_user_agent_rejected() {
        let mut config = Config::default();
        config.fetcher.user_agent = "  ".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_empty_database_path_rejected() {
        let mut config = Config::default();
        config.storage.database_path = Some(String::new());
        assert!(validate(&config).is_err());

        config.storage.database_path = Some(":memory:".to_string());
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_target_urls() {
        let mut config = Config::default();
        config.targets = vec![
            target("https://example.com/", None),
            target("http://example.org/files", Some(r"\.pdf$")),
        ];
        assert!(validate(&config).is_ok());

        config.targets.push(target("ftp://example.com/", None));
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));

        config.targets.pop();
        config.targets.push(target("not a url", None));
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidUrl(_)
        ));
    }

    #[test]
    fn test_bad_filter_rejected() {
        let mut config = Config::default();
        config.targets = vec![target("https://example.com/", Some("([a-z"))];
        assert!(matches!(
            validate(&config).unwrap_err(),
            ConfigError::InvalidPattern(_)
        ));
    }
}
