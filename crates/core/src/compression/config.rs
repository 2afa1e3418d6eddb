//! Configuration for the compression stage.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;

use super::types::{Locator, TimeoutTable};
use crate::backoff::BackoffPolicy;

/// Initial per-stage timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTimeouts {
    /// Page loads and element lookups.
    #[serde(default = "default_load_secs")]
    pub load_secs: u64,
    /// Remote processing and the start of the download.
    #[serde(default = "default_compress_secs")]
    pub compress_secs: u64,
    /// Completion of the download.
    #[serde(default = "default_completion_secs")]
    pub completion_secs: u64,
}

fn default_load_secs() -> u64 {
    5
}

fn default_compress_secs() -> u64 {
    20
}

fn default_completion_secs() -> u64 {
    100
}

impl Default for StageTimeouts {
    fn default() -> Self {
        Self {
            load_secs: default_load_secs(),
            compress_secs: default_compress_secs(),
            completion_secs: default_completion_secs(),
        }
    }
}

impl From<StageTimeouts> for TimeoutTable {
    fn from(t: StageTimeouts) -> Self {
        TimeoutTable::from_secs(t.load_secs, t.compress_secs, t.completion_secs)
    }
}

/// Elements of the remote site the session relies on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLocators {
    #[serde(default = "default_upload_input")]
    pub upload_input: Locator,
    #[serde(default = "default_submit_button")]
    pub submit_button: Locator,
    /// Appears once the remote side finished compressing.
    #[serde(default = "default_result_marker")]
    pub result_marker: Locator,
    #[serde(default = "default_download_link")]
    pub download_link: Locator,
}

fn default_upload_input() -> Locator {
    Locator::css(r#"input[name="upfile"]"#)
}

fn default_submit_button() -> Locator {
    Locator::css("#submitbutton")
}

fn default_result_marker() -> Locator {
    Locator::css(".result-message")
}

fn default_download_link() -> Locator {
    Locator::xpath(r#"//a[contains(@href, "download.php")]"#)
}

impl Default for SiteLocators {
    fn default() -> Self {
        Self {
            upload_input: default_upload_input(),
            submit_button: default_submit_button(),
            result_marker: default_result_marker(),
            download_link: default_download_link(),
        }
    }
}

/// Browser launched for every session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserConfig {
    /// W3C `browserName` capability.
    #[serde(default = "default_browser_name")]
    pub name: String,

    /// Vendor capability carrying args and prefs.
    #[serde(default = "default_options_key")]
    pub options_key: String,

    /// Browser binary. Uses the driver's default when unset.
    #[serde(default)]
    pub binary: Option<PathBuf>,

    #[serde(default = "default_true")]
    pub headless: bool,

    #[serde(default = "default_browser_args")]
    pub args: Vec<String>,

    /// Extra browser preferences merged over the download defaults.
    #[serde(default)]
    pub prefs: Map<String, Value>,
}

fn default_browser_name() -> String {
    "MicrosoftEdge".to_string()
}

fn default_options_key() -> String {
    "ms:edgeOptions".to_string()
}

fn default_true() -> bool {
    true
}

fn default_browser_args() -> Vec<String> {
    [
        "--incognito",
        "--no-sandbox",
        "--disable-gpu",
        "--disable-sync",
        "--disable-extensions",
        "--disable-notifications",
        "--disable-component-update",
        "--disable-background-networking",
        "--disable-blink-features=AutomationControlled",
        "--blink-settings=imagesEnabled=false",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: default_browser_name(),
            options_key: default_options_key(),
            binary: None,
            headless: true,
            args: default_browser_args(),
            prefs: Map::new(),
        }
    }
}

/// Configuration for the compression stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Running WebDriver endpoint.
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Driver binary to spawn at `webdriver_url`. When unset the endpoint
    /// must already be running.
    #[serde(default)]
    pub driver_path: Option<PathBuf>,

    /// Seconds to wait for a spawned driver to answer.
    #[serde(default = "default_driver_startup_secs")]
    pub driver_startup_secs: u64,

    #[serde(default = "default_site_url")]
    pub site_url: String,

    /// Attempts per file.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Concurrent sessions.
    #[serde(default = "default_workers")]
    pub workers: usize,

    #[serde(default)]
    pub timeouts: StageTimeouts,

    #[serde(default = "BackoffPolicy::compression_defaults")]
    pub backoff: BackoffPolicy,

    /// Interval between element and download directory polls.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default)]
    pub locators: SiteLocators,

    #[serde(default)]
    pub browser: BrowserConfig,
}

fn default_webdriver_url() -> String {
    "http://127.0.0.1:9515".to_string()
}

fn default_driver_startup_secs() -> u64 {
    10
}

fn default_site_url() -> String {
    "https://www.youcompress.com/zh-cn/".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_workers() -> usize {
    3
}

fn default_poll_interval_ms() -> u64 {
    250
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            webdriver_url: default_webdriver_url(),
            driver_path: None,
            driver_startup_secs: default_driver_startup_secs(),
            site_url: default_site_url(),
            max_retries: default_max_retries(),
            workers: default_workers(),
            timeouts: StageTimeouts::default(),
            backoff: BackoffPolicy::compression_defaults(),
            poll_interval_ms: default_poll_interval_ms(),
            locators: SiteLocators::default(),
            browser: BrowserConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_defaults() {
        let config = CompressionConfig::default();
        assert_eq!(config.workers, 3);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeouts.completion_secs, 100);
        assert_eq!(config.backoff.max_timeout_secs, 300.0);

        let table = TimeoutTable::from(config.timeouts);
        assert_eq!(table.load, Duration::from_secs(5));
        assert_eq!(table.compress, Duration::from_secs(20));
    }

    #[test]
    fn test_locators_from_toml() {
        let config: CompressionConfig = toml::from_str(
            r#"
[locators]
submit_button = { xpath = "//button[@type='submit']" }

[browser]
headless = false
prefs = { "download.prompt_for_download" = false }
"#,
        )
        .unwrap();

        assert_eq!(
            config.locators.submit_button,
            Locator::xpath("//button[@type='submit']")
        );
        assert_eq!(config.locators.upload_input, default_upload_input());
        assert!(!config.browser.headless);
        assert_eq!(config.browser.prefs.len(), 1);
    }
}
