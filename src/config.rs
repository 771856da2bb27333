use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{AppError, Result};
use crate::search::EXA_API_URL;

pub const API_KEY_ENV: &str = "EXA_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    pub exa_api_key: Option<String>,

    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Results requested per topic on a manual refresh.
    #[serde(default = "default_interactive_results")]
    pub interactive_results: u32,

    /// Results requested per topic on a background refresh.
    #[serde(default = "default_background_results")]
    pub background_results: u32,

    #[serde(default = "default_description_max_length")]
    pub description_max_length: usize,

    #[serde(default = "default_text_length")]
    pub text_length: u32,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("topic-feed");
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("feed.db").to_string_lossy().to_string()
}

fn default_api_base_url() -> String {
    EXA_API_URL.to_string()
}

fn default_interactive_results() -> u32 {
    10
}

fn default_background_results() -> u32 {
    5
}

fn default_description_max_length() -> usize {
    150
}

fn default_text_length() -> u32 {
    1000
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            exa_api_key: None,
            api_base_url: default_api_base_url(),
            interactive_results: default_interactive_results(),
            background_results: default_background_results(),
            description_max_length: default_description_max_length(),
            text_length: default_text_length(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save()?;
            config
        };

        // Environment wins over the file so keys never have to be written to disk
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            if !key.trim().is_empty() {
                config.exa_api_key = Some(key.trim().to_string());
            }
        }

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("topic-feed")
            .join("config.toml")
    }

    pub fn api_key(&self) -> Option<&str> {
        self.exa_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}
