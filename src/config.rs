//! Application configuration management.
//!
//! This module handles loading and saving the client configuration,
//! which includes the API base URL and the last used login.
//!
//! Configuration is stored at `~/.config/virsaa-admin/config.json`; the
//! `VIRSAA_API_URL` environment variable overrides the base URL.

use std::path::PathBuf;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "virsaa-admin";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the API base URL
const API_URL_ENV: &str = "VIRSAA_API_URL";

/// Production backend
const DEFAULT_API_BASE_URL: &str =
    "http://virsaa-prod.eba-7cc3yk92.us-east-1.elasticbeanstalk.com";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api_base_url: String,
    pub last_login: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            last_login: None,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            Self::default()
        };
        if let Ok(url) = std::env::var(API_URL_ENV) {
            config.api_base_url = url;
        }
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory where the credential store keeps its entries.
    pub fn store_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.api_base_url, DEFAULT_API_BASE_URL);
        assert!(config.last_login.is_none());
    }

    #[test]
    fn test_config_roundtrip() {
        let config = Config {
            api_base_url: "http://localhost:8000".to_string(),
            last_login: Some("admin@virsaa.com".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.api_base_url, "http://localhost:8000");
        assert_eq!(parsed.last_login.as_deref(), Some("admin@virsaa.com"));
    }
}
