//! Configuration for the favorites catalog client.

use serde::{Deserialize, Serialize};

use crate::backoff::BackoffPolicy;

/// Configuration for [`super::BilibiliFavorites`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Favorites folder id (`fid`). Required when acquisition runs.
    #[serde(default)]
    pub favorites_id: String,

    /// Items returned per request (1..=200).
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Initial request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts before giving up (1..=5).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value of the Referer and Origin headers.
    #[serde(default = "default_referer")]
    pub referer: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "BackoffPolicy::catalog_defaults")]
    pub backoff: BackoffPolicy,
}

fn default_page_size() -> u32 {
    200
}

fn default_timeout() -> u64 {
    5
}

fn default_max_retries() -> u32 {
    2
}

fn default_base_url() -> String {
    "https://api.bilibili.com".to_string()
}

fn default_referer() -> String {
    "https://www.bilibili.com".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/134.0.0.0 Safari/537.36 Edg/134.0.0.0"
        .to_string()
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            favorites_id: String::new(),
            page_size: default_page_size(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            base_url: default_base_url(),
            referer: default_referer(),
            user_agent: default_user_agent(),
            backoff: BackoffPolicy::catalog_defaults(),
        }
    }
}

impl CatalogConfig {
    /// Creates a config for the given favorites folder.
    pub fn for_favorites(favorites_id: impl Into<String>) -> Self {
        Self {
            favorites_id: favorites_id.into(),
            ..Default::default()
        }
    }

    /// Sets the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sets the retry bound.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the backoff policy.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CatalogConfig::default();
        assert_eq!(config.page_size, 200);
        assert_eq!(config.max_retries, 2);
        assert!(config.favorites_id.is_empty());
        assert_eq!(config.backoff, BackoffPolicy::catalog_defaults());
    }

    #[test]
    fn test_config_builder() {
        let config = CatalogConfig::for_favorites("123")
            .with_base_url("http://127.0.0.1:9000")
            .with_max_retries(4);
        assert_eq!(config.favorites_id, "123");
        assert_eq!(config.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.max_retries, 4);
    }
}
