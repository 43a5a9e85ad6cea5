//! Configuration loading and validation.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::calculate::{MatchFilter, PairwiseStrategy, DEFAULT_GAME};
use crate::models::DateRange;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Match feed source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Match history endpoint
    #[serde(default = "default_url")]
    pub url: String,

    /// Static JSON snapshot used instead of the endpoint
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    /// Upstream `start_date` query parameter (YYYY-MM-DD)
    #[serde(default = "default_start_date")]
    pub start_date: Option<String>,

    /// Upstream `end_date` query parameter (YYYY-MM-DD)
    #[serde(default)]
    pub end_date: Option<String>,

    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Stop paging after this many requests
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    /// Timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_url() -> String {
    "https://api.neatqueue.com/api/v1/history/1225010401000034425".to_string()
}

fn default_start_date() -> Option<String> {
    Some("2025-09-08".to_string())
}

fn default_page_size() -> u32 {
    1000
}

fn default_max_pages() -> u32 {
    20
}

fn default_timeout() -> u64 {
    30
}

fn default_user_agent() -> String {
    format!("inhouse-stats/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            snapshot_path: None,
            start_date: default_start_date(),
            end_date: None,
            page_size: default_page_size(),
            max_pages: default_max_pages(),
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Aggregation engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Game category to aggregate
    #[serde(default = "default_game")]
    pub game: String,

    /// How long a filter must stay unchanged before recomputing
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    #[serde(default)]
    pub pairwise: PairwiseStrategy,

    /// Only count participants flagged as picked
    #[serde(default)]
    pub require_picked: bool,
}

fn default_game() -> String {
    DEFAULT_GAME.to_string()
}

fn default_settle_ms() -> u64 {
    300
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            game: default_game(),
            settle_ms: default_settle_ms(),
            pairwise: PairwiseStrategy::default(),
            require_picked: false,
        }
    }
}

impl EngineConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    /// Filter for this engine over the given window.
    pub fn filter(&self, range: DateRange) -> MatchFilter {
        MatchFilter::new(self.game.clone())
            .with_range(range)
            .with_require_picked(self.require_picked)
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "*".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            source: SourceConfig::default(),
            engine: EngineConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::info!("No config at {}, using defaults", path.display());
            let config = Self::default();
            config.validate()?;
            Ok(config)
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.url.trim().is_empty() && self.source.snapshot_path.is_none() {
            return Err(ConfigError::ValidationError(
                "Either source.url or source.snapshot_path must be set".to_string(),
            ));
        }

        if self.source.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.source.max_pages == 0 {
            return Err(ConfigError::ValidationError(
                "Max pages must be greater than 0".to_string(),
            ));
        }

        if self.source.timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "Source timeout must be greater than 0".to_string(),
            ));
        }

        if self.engine.game.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "Engine game category must not be empty".to_string(),
            ));
        }

        if self.server.port == 0 {
            return Err(ConfigError::ValidationError(
                "Server port must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, "info");
        assert_eq!(config.engine.game, "dota");
        assert_eq!(config.engine.settle_ms, 300);
        assert_eq!(config.engine.pairwise, PairwiseStrategy::PerPair);
        assert!(!config.engine.require_picked);
        assert_eq!(config.source.page_size, 1000);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_config_validation_ok() {
        assert!(AppConfig::default().validate().is_ok());
    }

    #[test]
    fn test_config_validation_no_source() {
        let mut config = AppConfig::default();
        config.source.url = String::new();
        assert!(config.validate().is_err());

        config.source.snapshot_path = Some(PathBuf::from("snapshot.json"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_bad_page_size() {
        let mut config = AppConfig::default();
        config.source.page_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_bad_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_empty_game() {
        let mut config = AppConfig::default();
        config.engine.game = " ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            pairwise = "single_pass"
            require_picked = true
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.pairwise, PairwiseStrategy::SinglePass);
        assert!(config.engine.require_picked);
        assert_eq!(config.engine.game, "dota");
        assert_eq!(config.server.host, "127.0.0.1");
    }

    #[test]
    fn test_from_file_and_missing_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "log_level = \"debug\"\n[server]\nport = 9000\n").unwrap();

        let config = AppConfig::from_file(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9000);

        let missing = AppConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(missing.server.port, 8080);
    }

    #[test]
    fn test_from_file_rejects_invalid() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 0\n").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_engine_filter() {
        let engine = EngineConfig {
            game: "cs2".to_string(),
            require_picked: true,
            ..Default::default()
        };
        let filter = engine.filter(DateRange::all());
        assert_eq!(filter.game, "cs2");
        assert!(filter.require_picked);
        assert_eq!(engine.settle_delay(), Duration::from_millis(300));
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();

        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.source.url, parsed.source.url);
        assert_eq!(config.engine.settle_ms, parsed.engine.settle_ms);
    }
}
