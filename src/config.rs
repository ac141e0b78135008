use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::ai::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_HOST};
use crate::error::{AppError, Result};

const APP_DIR: &str = "relevance-reader";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    #[serde(default = "default_ollama_host")]
    pub ollama_host: String,

    #[serde(default = "default_ollama_model")]
    pub ollama_model: String,

    pub raindrop_token: Option<String>,

    /// Raindrop collection to save into; Unsorted when unset or missing.
    pub raindrop_collection: Option<String>,

    #[serde(default = "default_tags")]
    pub default_tags: Vec<String>,

    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_minutes: u32,

    #[serde(default)]
    pub feeds: Vec<FeedConfig>,

    #[serde(default)]
    pub interests: Vec<InterestConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterestConfig {
    pub description: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_db_path() -> String {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
        .join("items.db")
        .to_string_lossy()
        .to_string()
}

/// Expands a leading `~` to the home directory.
fn expand_home(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return path.to_string(),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home.to_string_lossy().to_string(),
        Some(home) => home.join(rest).to_string_lossy().to_string(),
        None => path.to_string(),
    }
}

fn default_ollama_host() -> String {
    DEFAULT_OLLAMA_HOST.to_string()
}

fn default_ollama_model() -> String {
    DEFAULT_EMBEDDING_MODEL.to_string()
}

fn default_tags() -> Vec<String> {
    vec!["rss".to_string()]
}

fn default_max_age_days() -> u32 {
    14
}

fn default_refresh_interval() -> u32 {
    15
}

fn default_weight() -> f64 {
    1.0
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            ollama_host: default_ollama_host(),
            ollama_model: default_ollama_model(),
            raindrop_token: None,
            raindrop_collection: None,
            default_tags: default_tags(),
            max_age_days: default_max_age_days(),
            refresh_interval_minutes: default_refresh_interval(),
            feeds: Vec::new(),
            interests: Vec::new(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Reads `path`, writing a default config there first if it is missing.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let mut config: Config = toml::from_str(&content)?;
            config.db_path = expand_home(&config.db_path);
            config.validate()?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    /// Age window for the unread working set and expiry.
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::days(i64::from(self.max_age_days))
    }

    fn validate(&self) -> Result<()> {
        if self.max_age_days == 0 {
            return Err(AppError::Config("max_age_days must be at least 1".to_string()));
        }
        if let Some(bad) = self
            .interests
            .iter()
            .find(|i| !i.weight.is_finite() || i.weight < 0.0)
        {
            return Err(AppError::Config(format!(
                "interest '{}' has invalid weight {}",
                bad.description, bad.weight
            )));
        }
        Ok(())
    }
}
