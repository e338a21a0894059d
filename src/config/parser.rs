use crate::config::types::Config;
use crate::config::validation::validate;
use crate::storage::MEMORY_DATABASE;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Environment variable naming the configuration file
pub const CONFIG_ENV: &str = "UNFURL_CONFIG";

/// Environment variable naming the snapshot database
pub const DATABASE_ENV: &str = "UNFURL_DATABASE";

const ROOT_CONFIG_PATH: &str = "/etc/unfurl.cfg";
const ROOT_DATABASE_PATH: &str = "/var/db/unfurl/db.sqlite3";
const USER_DIR: &str = ".unfurl";

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use unfurl::config::load_config;
///
/// let config = load_config(Path::new("unfurl.toml")).unwrap();
/// println!("Period: {}s", config.crawler.period);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration text
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

/// Where configuration and data live when not given explicitly
#[derive(Debug, Clone, Default)]
pub struct Locations {
    /// Value of `UNFURL_CONFIG`
    pub env_config: Option<PathBuf>,

    /// Value of `UNFURL_DATABASE`
    pub env_database: Option<String>,

    pub home: Option<PathBuf>,

    /// Running as the superuser selects system-wide paths
    pub is_root: bool,
}

impl Locations {
    /// Reads locations from the process environment
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.is_empty());

        Self {
            env_config: non_empty(CONFIG_ENV).map(PathBuf::from),
            env_database: non_empty(DATABASE_ENV),
            home: non_empty("HOME").map(PathBuf::from),
            is_root: non_empty("USER").as_deref() == Some("root"),
        }
    }

    /// The configuration file to read when none is given on the command line
    pub fn config_file(&self) -> Result<PathBuf, ConfigError> {
        if let Some(path) = &self.env_config {
            return Ok(path.clone());
        }
        if self.is_root {
            return Ok(PathBuf::from(ROOT_CONFIG_PATH));
        }
        Ok(self.user_dir("configuration file")?.join("config"))
    }

    /// The database location, preferring `configured` when present
    pub fn database(&self, configured: Option<&str>) -> Result<String, ConfigError> {
        if let Some(path) = configured {
            return self.expand_home(path);
        }
        if let Some(path) = &self.env_database {
            return self.expand_home(path);
        }
        if self.is_root {
            return Ok(ROOT_DATABASE_PATH.to_string());
        }
        Ok(self
            .user_dir("database")?
            .join("db.sqlite3")
            .to_string_lossy()
            .into_owned())
    }

    fn user_dir(&self, what: &'static str) -> Result<PathBuf, ConfigError> {
        self.home
            .as_ref()
            .map(|home| home.join(USER_DIR))
            .ok_or(ConfigError::NoHomeDir(what))
    }

    fn expand_home(&self, path: &str) -> Result<String, ConfigError> {
        match path.strip_prefix("~/") {
            Some(rest) => {
                let home = self.home.as_ref().ok_or(ConfigError::NoHomeDir("database"))?;
                Ok(home.join(rest).to_string_lossy().into_owned())
            }
            None => Ok(path.to_string()),
        }
    }
}

/// A configuration together with where it came from
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: Config,

    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,

    /// SHA-256 of the file content, if a file was read
    pub hash: Option<String>,
}

/// Resolves and loads the configuration
///
/// An explicit path must exist. The resolved default path may be missing, in
/// which case built-in defaults are used.
pub fn resolve_config(
    explicit: Option<&Path>,
    locations: &Locations,
) -> Result<LoadedConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (locations.config_file()?, locations.env_config.is_some()),
    };

    if !required && !path.exists() {
        tracing::debug!("No configuration at {}, using defaults", path.display());
        return Ok(LoadedConfig {
            config: Config::default(),
            source: None,
            hash: None,
        });
    }

    let (config, hash) = load_config_with_hash(&path)?;
    Ok(LoadedConfig {
        config,
        source: Some(path),
        hash: Some(hash),
    })
}

/// Creates the parent directory of a file database
///
/// Does nothing for the in-memory database.
pub fn prepare_storage_dir(database: &str) -> Result<(), ConfigError> {
    if database == MEMORY_DATABASE {
        return Ok(());
    }

    if let Some(parent) = Path::new(database).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            tracing::debug!("Creating storage directory {}", parent.display());
            std::fs::create_dir_all(parent)?;
        }
    }

    Ok(())
}
