//! Configuration file parser for ~/.config/feedmill/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are accepted but logged as warnings since they are most
//! likely typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database file. `None` means `feedmill.db` next to the config
    /// file; see [`Config::database_file`].
    pub database_path: Option<PathBuf>,

    /// Consecutive already-known entries after which a feed scan stops.
    pub max_old_entries: usize,

    /// Per-request timeout for feed downloads, in seconds.
    pub fetch_timeout_secs: u64,

    /// Feeds ingested at the same time during a batch. 1 = sequential.
    pub max_concurrent_fetches: usize,

    /// Minutes between batches in `feedmill watch`.
    pub refresh_interval_minutes: u64,

    /// User-Agent header sent with every feed request.
    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            max_old_entries: 10,
            fetch_timeout_secs: 30,
            max_concurrent_fetches: 4,
            refresh_interval_minutes: 30,
            user_agent: concat!("feedmill/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "max_old_entries",
        "fetch_timeout_secs",
        "max_concurrent_fetches",
        "refresh_interval_minutes",
        "user_agent",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
    /// - Zero for a count or timeout → raised to 1, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // Check file size before reading so a huge file is never pulled into memory
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // Race condition: file deleted between metadata and read
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config = Self::from_toml(&content)?;
        tracing::info!(
            path = %path.display(),
            max_old_entries = config.max_old_entries,
            max_concurrent_fetches = config.max_concurrent_fetches,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse configuration from TOML text, applying the same checks as
    /// [`Config::load`].
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            tracing::debug!("Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        Ok(config.clamped())
    }

    /// The database file to open for a config loaded from `config_path`.
    pub fn database_file(&self, config_path: &Path) -> PathBuf {
        match &self.database_path {
            Some(path) => path.clone(),
            None => config_path
                .parent()
                .unwrap_or_else(|| Path::new(""))
                .join("feedmill.db"),
        }
    }

    fn clamped(mut self) -> Self {
        if self.max_old_entries == 0 {
            tracing::warn!("max_old_entries = 0 would skip every entry, using 1");
            self.max_old_entries = 1;
        }
        if self.max_concurrent_fetches == 0 {
            tracing::warn!("max_concurrent_fetches = 0 would never fetch, using 1");
            self.max_concurrent_fetches = 1;
        }
        if self.fetch_timeout_secs == 0 {
            tracing::warn!("fetch_timeout_secs = 0 would fail every fetch, using 1");
            self.fetch_timeout_secs = 1;
        }
        if self.refresh_interval_minutes == 0 {
            tracing::warn!("refresh_interval_minutes = 0 would run batches back to back, using 1");
            self.refresh_interval_minutes = 1;
        }
        self
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.database_path, None);
        assert_eq!(config.max_old_entries, 10);
        assert_eq!(config.fetch_timeout_secs, 30);
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.refresh_interval_minutes, 30);
        assert!(config.user_agent.starts_with("feedmill/"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/feedmill_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_whitespace_only_returns_default() {
        assert_eq!(Config::from_toml("   \n  \n  ").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let config = Config::from_toml("max_old_entries = 25\n").unwrap();
        assert_eq!(config.max_old_entries, 25);
        assert_eq!(config.max_concurrent_fetches, 4);
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn test_full_config_from_file() {
        let dir = std::env::temp_dir().join("feedmill_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
database_path = "/var/lib/feedmill/feeds.db"
max_old_entries = 5
fetch_timeout_secs = 10
max_concurrent_fetches = 1
refresh_interval_minutes = 60
user_agent = "my-aggregator/2.0"
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(
            config,
            Config {
                database_path: Some(PathBuf::from("/var/lib/feedmill/feeds.db")),
                max_old_entries: 5,
                fetch_timeout_secs: 10,
                max_concurrent_fetches: 1,
                refresh_interval_minutes: 60,
                user_agent: "my-aggregator/2.0".to_string(),
            }
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_values_are_clamped() {
        let config = Config::from_toml(
            "max_old_entries = 0\nmax_concurrent_fetches = 0\nfetch_timeout_secs = 0\nrefresh_interval_minutes = 0\n",
        )
        .unwrap();
        assert_eq!(config.max_old_entries, 1);
        assert_eq!(config.max_concurrent_fetches, 1);
        assert_eq!(config.fetch_timeout_secs, 1);
        assert_eq!(config.refresh_interval_minutes, 1);
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let err = Config::from_toml("this is not [valid toml").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));
    }

    #[test]
    fn test_database_file_defaults_next_to_config() {
        let config = Config::default();
        assert_eq!(
            config.database_file(Path::new("/srv/feeds/feedmill.toml")),
            PathBuf::from("/srv/feeds/feedmill.db")
        );
        assert_eq!(
            config.database_file(Path::new("feedmill.toml")),
            PathBuf::from("feedmill.db")
        );

        let config = Config::from_toml("database_path = \"/var/lib/feedmill/catalog.db\"\n").unwrap();
        assert_eq!(
            config.database_file(Path::new("/srv/feeds/feedmill.toml")),
            PathBuf::from("/var/lib/feedmill/catalog.db")
        );
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let config = Config::from_toml("max_old_entries = 3\ntotally_fake_key = 42\n").unwrap();
        assert_eq!(config.max_old_entries, 3);
    }

    #[test]
    fn test_wrong_type_returns_error() {
        assert!(Config::from_toml("max_old_entries = \"ten\"\n").is_err());
        assert!(Config::from_toml("max_concurrent_fetches = -1\n").is_err());
    }

    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("feedmill_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
