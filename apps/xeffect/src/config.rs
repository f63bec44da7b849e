//! Configuration for xeffect.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable holding the milestone API key.
pub const API_KEY_ENV: &str = "OPEN_AI_API_KEY";
/// Environment variable overriding the milestone model.
pub const MODEL_ENV: &str = "OPENAI_MODEL";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Acting user.
    #[serde(default)]
    pub user: UserConfig,
    /// Milestone message settings.
    #[serde(default)]
    pub milestones: MilestoneConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from default path.
    pub fn load() -> Self {
        Self::config_path()
            .filter(|p| p.exists())
            .and_then(|p| Self::load_from(&p).ok())
            .unwrap_or_default()
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(std::env::var(API_KEY_ENV).ok(), std::env::var(MODEL_ENV).ok())
    }

    fn with_overrides(mut self, api_key: Option<String>, model: Option<String>) -> Self {
        if let Some(key) = api_key.filter(|k| !k.trim().is_empty()) {
            self.milestones.api_key = Some(key);
        }
        if let Some(model) = model.filter(|m| !m.trim().is_empty()) {
            self.milestones.model = model;
        }
        self
    }

    /// Database location: configured path, else the platform data dir.
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .or_else(Self::default_db_path)
            .unwrap_or_else(|| "xeffect.db".into())
    }

    /// Get configuration file path.
    pub fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "xeffect")
            .map(|d| d.config_dir().join("config.toml"))
    }

    /// Get default database path.
    pub fn default_db_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "xeffect").map(|d| d.data_dir().join("habits.db"))
    }
}

/// Storage settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
}

/// Acting user settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// User id whose habit commands act on.
    #[serde(default = "default_user_id")]
    pub id: String,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            id: default_user_id(),
        }
    }
}

fn default_user_id() -> String {
    "local".to_string()
}

/// Milestone message settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneConfig {
    /// Ask for messages at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// API key; messages are skipped when unset.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Responses endpoint URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for MilestoneConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            model: default_model(),
            endpoint: default_endpoint(),
            timeout_secs: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/responses".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// Log output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default level when `RUST_LOG` is unset.
    #[serde(default = "default_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable text.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_level() -> String {
    "warn".to_string()
}
