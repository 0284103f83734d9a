//! Persistent CLI configuration.

use std::path::{Path, PathBuf};

use quire_core::util::{is_http_url, normalize_text_option};
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "config.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub const API_ENDPOINT_ENV: &str = "QUIRE_API_ENDPOINT";
pub const API_KEY_ENV: &str = "QUIRE_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub api_endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            version: default_config_version(),
            api_endpoint: None,
            api_key: None,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// Everything the sync command needs to reach the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub endpoint: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

const fn default_config_version() -> u32 {
    1
}

const fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

pub fn default_config_path() -> Result<PathBuf, String> {
    dirs::config_dir()
        .map(|dir| dir.join("quire").join(CONFIG_FILE_NAME))
        .ok_or_else(|| "Failed to resolve CLI config directory".to_string())
}

impl CliConfig {
    pub fn load() -> Result<Self, String> {
        Self::load_from_path(&default_config_path()?)
    }

    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save(&self) -> Result<PathBuf, String> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Let environment variables override file values.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(endpoint) = normalize_text_option(std::env::var(API_ENDPOINT_ENV).ok()) {
            self.api_endpoint = Some(endpoint);
        }
        if let Some(api_key) = normalize_text_option(std::env::var(API_KEY_ENV).ok()) {
            self.api_key = Some(api_key);
        }
        self
    }

    /// Endpoint and key, or `None` while either is missing.
    pub fn sync_settings(&self) -> Option<SyncSettings> {
        Some(SyncSettings {
            endpoint: normalize_text_option(self.api_endpoint.clone())?,
            api_key: normalize_text_option(self.api_key.clone())?,
            timeout_secs: self.timeout_secs,
        })
    }

    pub fn validate(&self) -> Result<(), String> {
        if let Some(endpoint) = normalize_text_option(self.api_endpoint.clone()) {
            if !is_http_url(&endpoint) {
                return Err("api_endpoint must include http:// or https://".to_string());
            }
        }
        if self.timeout_secs == 0 {
            return Err("timeout_secs must be greater than zero".to_string());
        }
        Ok(())
    }

    fn normalize(&mut self) {
        self.api_endpoint = normalize_text_option(self.api_endpoint.clone())
            .map(|endpoint| endpoint.trim_end_matches('/').to_string());
        self.api_key = normalize_text_option(self.api_key.clone());
    }
}
