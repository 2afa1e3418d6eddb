//! `you-get` based downloader implementation.

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::debug;

use super::{DownloadError, DownloadOutput, DownloadRequest, Downloader, DownloaderConfig};

/// Longest stderr excerpt kept in errors.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;

/// Downloader that runs `you-get <url> --no-caption -O <name> -o <dir>`.
pub struct YouGetDownloader {
    config: DownloaderConfig,
}

impl YouGetDownloader {
    /// Creates a new downloader with the given configuration.
    pub fn new(config: DownloaderConfig) -> Self {
        Self { config }
    }

    /// Creates a downloader with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(DownloaderConfig::default())
    }

    /// Expands a bare video id into a full URL.
    pub fn source_url(&self, source: &str) -> String {
        if source.contains("://") || source.contains("bilibili.com/video/") {
            source.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.video_base_url.trim_end_matches('/'),
                source
            )
        }
    }

    fn build_args(&self, request: &DownloadRequest) -> Vec<String> {
        vec![
            self.source_url(&request.source),
            "--no-caption".to_string(),
            "-O".to_string(),
            request.name.clone(),
            "-o".to_string(),
            request.output_dir.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl Downloader for YouGetDownloader {
    fn name(&self) -> &str {
        "you-get"
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutput, DownloadError> {
        let args = self.build_args(request);
        debug!(tool = ?self.config.you_get_path, ?args, "Starting download");

        let child = Command::new(&self.config.you_get_path)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    DownloadError::ToolNotFound {
                        path: self.config.you_get_path.clone(),
                    }
                } else {
                    DownloadError::Io(e)
                }
            })?;

        // Dropping the future on timeout drops the child, which kills it.
        let output = match timeout(request.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(DownloadError::Timeout {
                    timeout_secs: request.timeout.as_secs_f64(),
                })
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DownloadError::ProcessFailed {
                code: output.status.code(),
                stderr: excerpt(&stderr),
            });
        }

        Ok(DownloadOutput {
            diagnostics: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

/// Keeps the tail of `text`, where tools report their errors.
fn excerpt(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    let count = trimmed.chars().count();
    Some(trimmed.chars().skip(count.saturating_sub(MAX_DIAGNOSTIC_CHARS)).collect())
}
