//! Configuration for the downloader module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backoff::BackoffPolicy;

/// Configuration for the `you-get` based downloader.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloaderConfig {
    /// Path to the you-get binary.
    #[serde(default = "default_you_get_path")]
    pub you_get_path: PathBuf,

    /// Initial per-attempt timeout in seconds (30..=120).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Attempts per item.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Prefix used to turn a bare video id into a URL.
    #[serde(default = "default_video_base_url")]
    pub video_base_url: String,

    #[serde(default = "BackoffPolicy::download_defaults")]
    pub backoff: BackoffPolicy,
}

fn default_you_get_path() -> PathBuf {
    PathBuf::from("you-get")
}

fn default_timeout() -> u64 {
    60
}

fn default_max_retries() -> u32 {
    2
}

fn default_video_base_url() -> String {
    "https://www.bilibili.com/video/".to_string()
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            you_get_path: default_you_get_path(),
            timeout_secs: default_timeout(),
            max_retries: default_max_retries(),
            video_base_url: default_video_base_url(),
            backoff: BackoffPolicy::download_defaults(),
        }
    }
}

impl DownloaderConfig {
    /// Creates a config with a custom you-get path.
    pub fn with_path(you_get_path: PathBuf) -> Self {
        Self {
            you_get_path,
            ..Default::default()
        }
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
