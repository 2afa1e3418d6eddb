//! Downloader module: fetches a media item into a scratch directory.
//!
//! The pipeline only depends on the [`Downloader`] trait; [`YouGetDownloader`]
//! shells out to `you-get`.

mod config;
mod you_get;

pub use config::DownloaderConfig;
pub use you_get::YouGetDownloader;

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while downloading.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Download tool binary not found.
    #[error("Download tool not found at path: {path}")]
    ToolNotFound { path: PathBuf },

    /// Tool exited with a failure status.
    #[error("Download process failed with code {code:?}")]
    ProcessFailed {
        code: Option<i32>,
        stderr: Option<String>,
    },

    /// Tool did not finish in time.
    #[error("Download timed out after {timeout_secs:.1} seconds")]
    Timeout { timeout_secs: f64 },

    /// I/O error while running the tool.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl DownloadError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::ToolNotFound { .. })
    }
}

/// One download invocation.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// Catalog id or full URL of the item.
    pub source: String,
    /// Output base name, without extension.
    pub name: String,
    /// Directory the tool writes into.
    pub output_dir: PathBuf,
    /// Upper bound for this attempt.
    pub timeout: Duration,
}

/// Result of a successful download.
#[derive(Debug, Clone, Default)]
pub struct DownloadOutput {
    /// Captured tool output, for diagnostics.
    pub diagnostics: String,
}

/// Fetches media items.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Returns the name of this downloader implementation.
    fn name(&self) -> &str;

    /// Runs one download attempt.
    ///
    /// Any failure is reported as an error; the caller decides whether to
    /// retry.
    async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutput, DownloadError>;
}
