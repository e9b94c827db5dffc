//! Application configuration management.
//!
//! Configuration is stored at `~/.config/talemo/config.json`. Every value is
//! optional; environment variables take precedence over the file.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/data/cache directory paths
pub const APP_NAME: &str = "talemo";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Sub-directory of the data dir holding one file per session field
const SESSION_DIR: &str = "session";

/// Backend used when nothing else is configured
pub const DEFAULT_BACKEND_URL: &str = "http://localhost:8000";

/// Value of the surface-identifying header when nothing else is configured
pub const DEFAULT_SURFACE: &str = "talemo-tui";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Environment override for the backend URL
pub const BACKEND_URL_ENV: &str = "TALEMO_BACKEND_URL";

/// Where the session fields are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// One file per field under the data directory
    #[default]
    File,
    /// OS keychain
    Keyring,
    /// Nothing survives the process
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    pub backend_url: Option<String>,
    pub surface: Option<String>,
    #[serde(default)]
    pub store: StoreKind,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            Ok(serde_json::from_str(&contents).context("Failed to parse config file")?)
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Backend URL: environment, then config file, then the local default.
    pub fn backend_url(&self) -> String {
        let env = std::env::var(BACKEND_URL_ENV).ok();
        Self::resolve_backend_url(env.as_deref(), self.backend_url.as_deref())
    }

    fn resolve_backend_url(env: Option<&str>, configured: Option<&str>) -> String {
        let url = [env, configured]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|v| !v.is_empty())
            .unwrap_or(DEFAULT_BACKEND_URL);
        url.trim_end_matches('/').to_string()
    }

    pub fn surface(&self) -> &str {
        self.surface
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_SURFACE)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(
            self.request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        )
    }

    /// Installation-wide directory for the file store.
    pub fn session_dir(&self) -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find data directory"))?;
        Ok(data_dir.join(APP_NAME).join(SESSION_DIR))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
