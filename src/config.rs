//! Configuration file parser for ~/.config/briefing/config.toml.
//!
//! The config file is optional — a missing file yields `Config::default()`.
//! Unknown keys are silently ignored by serde (with `deny_unknown_fields` off),
//! though we log a warning when the file contains potential typos.
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::aggregate::AggregateOptions;
use crate::feed::{FetchSettings, BROWSER_USER_AGENT};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid config value: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
/// Missing keys fall back to `Default::default()`. Command-line flags take
/// precedence over every value here.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// User-Agent header sent with every feed request.
    pub user_agent: String,

    /// Per-feed request timeout in seconds.
    pub timeout_secs: u64,

    /// JSON list of feed sources.
    pub sources_path: PathBuf,

    /// Where the aggregated JSON dump is written.
    pub output_path: PathBuf,

    /// Age window in hours (168 = one week).
    pub max_age_hours: u64,

    /// Drop items older than `max_age_hours` instead of keeping everything the
    /// feed returns.
    pub strict_age_filter: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            timeout_secs: 15,
            sources_path: PathBuf::from("data/content_sources.json"),
            output_path: PathBuf::from("data/aggregated_content.json"),
            max_age_hours: 168,
            strict_age_filter: false,
        }
    }
}

impl Config {
    /// SEC-014: Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "user_agent",
        "timeout_secs",
        "sources_path",
        "output_path",
        "max_age_hours",
        "strict_age_filter",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted (serde default behavior), logged as warning
    /// - `timeout_secs = 0` → `Err(ConfigError::Invalid)`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        // SEC-014: Check file size before reading to prevent memory exhaustion
        // from a maliciously large or corrupted config file.
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

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        if config.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "timeout_secs must be at least 1".to_string(),
            ));
        }

        tracing::info!(
            path = %path.display(),
            sources = %config.sources_path.display(),
            timeout_secs = config.timeout_secs,
            "Loaded configuration"
        );
        Ok(config)
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            user_agent: self.user_agent.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }

    pub fn aggregate_options(&self) -> AggregateOptions {
        AggregateOptions {
            max_age_hours: self.max_age_hours,
            strict_age_filter: self.strict_age_filter,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.user_agent, BROWSER_USER_AGENT);
        assert_eq!(config.timeout_secs, 15);
        assert_eq!(config.max_age_hours, 168);
        assert!(!config.strict_age_filter);
        assert_eq!(config.sources_path, PathBuf::from("data/content_sources.json"));
        assert_eq!(config.output_path, PathBuf::from("data/aggregated_content.json"));
    }

    #[test]
    fn test_missing_file_returns_default() {
        let path = Path::new("/tmp/briefing_test_nonexistent_config.toml");
        let config = Config::load(path).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_empty_file_returns_default() {
        let dir = std::env::temp_dir().join("briefing_config_test_empty");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "   \n  \n  ").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config, Config::default());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_partial_config_uses_defaults_for_missing() {
        let dir = std::env::temp_dir().join("briefing_config_test_partial");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "timeout_secs = 5\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.max_age_hours, 168); // default
        assert_eq!(config.fetch_settings().timeout, Duration::from_secs(5));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_full_config() {
        let dir = std::env::temp_dir().join("briefing_config_test_full");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");

        let content = r#"
user_agent = "briefing/0.1"
timeout_secs = 30
sources_path = "/srv/briefing/sources.json"
output_path = "/srv/briefing/out.json"
max_age_hours = 24
strict_age_filter = true
"#;
        std::fs::write(&path, content).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.user_agent, "briefing/0.1");
        assert_eq!(config.sources_path, PathBuf::from("/srv/briefing/sources.json"));
        assert_eq!(config.output_path, PathBuf::from("/srv/briefing/out.json"));
        assert_eq!(
            config.aggregate_options(),
            AggregateOptions {
                max_age_hours: 24,
                strict_age_filter: true,
            }
        );

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = std::env::temp_dir().join("briefing_config_test_invalid");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        assert!(err.to_string().contains("Invalid TOML"));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_unknown_keys_accepted() {
        let dir = std::env::temp_dir().join("briefing_config_test_unknown");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "max_age_hours = 48\ntheme = \"dark\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.max_age_hours, 48);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_wrong_type_returns_error() {
        let dir = std::env::temp_dir().join("briefing_config_test_wrongtype");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "timeout_secs = \"fifteen\"\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = std::env::temp_dir().join("briefing_config_test_zero_timeout");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "timeout_secs = 0\n").unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));

        std::fs::remove_dir_all(&dir).ok();
    }

    // SEC-014: File size limit
    #[test]
    fn test_too_large_file_rejected() {
        let dir = std::env::temp_dir().join("briefing_config_test_too_large");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.toml");
        std::fs::write(&path, "a".repeat(1_048_577)).unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::TooLarge(_)));
        assert!(err.to_string().contains("too large"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
