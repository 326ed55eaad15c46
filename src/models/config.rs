//! Application configuration structures.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Search query and windowing settings
    #[serde(default)]
    pub search: SearchConfig,

    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Checkpoint output settings
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.search.query.trim().is_empty() {
            return Err(AppError::validation("search.query is empty"));
        }
        if self.search.per_page == 0 || self.search.per_page > 100 {
            return Err(AppError::validation("search.per_page must be 1..=100"));
        }
        if self.search.window_days == 0 {
            return Err(AppError::validation("search.window_days must be > 0"));
        }
        if self.crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if self.crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if self.crawler.enrich_concurrency == 0 {
            return Err(AppError::validation(
                "crawler.enrich_concurrency must be > 0",
            ));
        }
        Ok(())
    }
}

/// Search query and date-window settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Base search filter; a `created:{start}..{end}` window is appended per page
    #[serde(default = "defaults::query")]
    pub query: String,

    /// Results per search page (API maximum is 100)
    #[serde(default = "defaults::per_page")]
    pub per_page: u32,

    /// Width of the backward-moving date window, in days
    #[serde(default = "defaults::window_days")]
    pub window_days: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            query: defaults::query(),
            per_page: defaults::per_page(),
            window_days: defaults::window_days(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for API requests (required by the API)
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Immediate retries for transient request failures
    #[serde(default = "defaults::max_transient_retries")]
    pub max_transient_retries: u32,

    /// Maximum concurrently enriched organizations within one page
    #[serde(default = "defaults::enrich_concurrency")]
    pub enrich_concurrency: usize,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_transient_retries: defaults::max_transient_retries(),
            enrich_concurrency: defaults::enrich_concurrency(),
        }
    }
}

/// Checkpoint output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON checkpoint file
    #[serde(default = "defaults::checkpoint_path")]
    pub checkpoint_path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            checkpoint_path: defaults::checkpoint_path(),
        }
    }
}

mod defaults {
    use std::path::PathBuf;

    // Search defaults
    pub fn query() -> String {
        "location:brazil type:org repos:>0".into()
    }
    pub fn per_page() -> u32 {
        100
    }
    pub fn window_days() -> u32 {
        7
    }

    // Crawler defaults
    pub fn user_agent() -> String {
        "orgcensus/1.0".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_transient_retries() -> u32 {
        1
    }
    pub fn enrich_concurrency() -> usize {
        4
    }

    // Output defaults
    pub fn checkpoint_path() -> PathBuf {
        PathBuf::from("result.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_default_config_ok() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_empty_query() {
        let mut config = Config::default();
        config.search.query = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_oversized_page() {
        let mut config = Config::default();
        config.search.per_page = 250;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_window() {
        let mut config = Config::default();
        config.search.window_days = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = Config::default();
        config.crawler.enrich_concurrency = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            [search]
            query = "location:portugal type:org"

            [crawler]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.search.query, "location:portugal type:org");
        assert_eq!(config.search.per_page, 100);
        assert_eq!(config.crawler.timeout_secs, 10);
        assert_eq!(config.crawler.max_transient_retries, 1);
    }
}
