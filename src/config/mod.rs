//! Configuration management for Studyset

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::history::store::MAX_LIMIT;

/// Environment variable that overrides [`Config::api_base`]
pub const API_BASE_ENV: &str = "STUDYSET_API_BASE";

/// Application configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root URL of the study service
    pub api_base: String,

    /// How many history entries to load
    pub history_limit: u32,

    /// Transport timeout for every request, in seconds
    pub request_timeout_secs: u64,

    /// Speech command line, fed the text on stdin (auto-detected when unset)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speech_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:5000".to_string(),
            history_limit: 25,
            request_timeout_secs: 300,
            speech_command: None,
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        let config = if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")?
        } else {
            let config = Self::default();
            config.save()?;
            config
        };

        Ok(config.with_env_overrides(std::env::var(API_BASE_ENV).ok()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "studyset").context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    fn with_env_overrides(mut self, api_base: Option<String>) -> Self {
        if let Some(base) = api_base.filter(|b| !b.trim().is_empty()) {
            self.api_base = base.trim().to_string();
        }
        self.history_limit = self.history_limit.clamp(1, MAX_LIMIT);
        self
    }

    /// Transport timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
