//! Per-item pipeline implementation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::backoff::RetryState;
use crate::catalog::MediaDescriptor;
use crate::converter::{ConversionJob, Converter};
use crate::downloader::{DownloadRequest, Downloader};
use crate::identity::list_files;
use crate::metrics::Metrics;
use crate::tagger::Tagger;

use super::config::PipelineConfig;
use super::types::{PipelineOutcome, PipelineTask};

/// Error type for pipeline operations.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Scratch directory could not be created.
    #[error("Failed to create scratch directory: {0}")]
    ScratchDir(#[source] std::io::Error),

    /// Every download attempt failed.
    #[error("Download failed after {attempts} attempts: {last_error}")]
    DownloadExhausted { attempts: u32, last_error: String },

    /// Download reported success but left no file behind.
    #[error("Download produced no file in {dir}")]
    NoDownloadedArtifact { dir: PathBuf },

    /// Every conversion attempt failed.
    #[error("Conversion failed after {attempts} attempts: {last_error}")]
    ConversionExhausted { attempts: u32, last_error: String },
}

/// Download, convert and tag one media item.
pub struct ItemPipeline {
    config: PipelineConfig,
    downloader: Arc<dyn Downloader>,
    converter: Arc<dyn Converter>,
    tagger: Arc<dyn Tagger>,
    metrics: Option<Metrics>,
}

impl ItemPipeline {
    /// Creates a new pipeline.
    pub fn new(
        config: PipelineConfig,
        downloader: Arc<dyn Downloader>,
        converter: Arc<dyn Converter>,
        tagger: Arc<dyn Tagger>,
    ) -> Self {
        Self {
            config,
            downloader,
            converter,
            tagger,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Output path for `descriptor`, unique per title.
    pub fn output_path_for(&self, descriptor: &MediaDescriptor) -> PathBuf {
        self.config.output_dir.join(format!(
            "{}.{}",
            descriptor.title,
            self.config.audio_format.extension()
        ))
    }

    /// Runs the full pipeline for one descriptor.
    ///
    /// The scratch directory is removed on every exit path, including
    /// when the returned future is dropped.
    pub async fn run(&self, descriptor: &MediaDescriptor) -> Result<PipelineOutcome, PipelineError> {
        let start = Instant::now();

        let scratch = tempfile::Builder::new()
            .prefix("musicdl-")
            .tempdir_in(&self.config.scratch_root)
            .map_err(PipelineError::ScratchDir)?;
        let task = PipelineTask {
            descriptor: descriptor.clone(),
            output_dir: self.config.output_dir.clone(),
            scratch_dir: scratch.path().to_path_buf(),
        };
        debug!(scratch = %task.scratch_dir.display(), "Scratch directory created");

        let download_attempts = self.download(&task).await?;
        let artifact = pick_artifact(&task.scratch_dir).await?;
        let (output_path, conversion_attempts) = self.convert(&task, &artifact).await?;

        if let Err(e) = tokio::fs::remove_file(&artifact).await {
            warn!(path = %artifact.display(), error = %e, "Failed to remove downloaded file");
        }

        let tagged = match self.tagger.apply(&output_path, &self.config.tags).await {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %output_path.display(), error = %e, "Tagging skipped");
                false
            }
        };

        let outcome = PipelineOutcome {
            output_path,
            download_attempts,
            conversion_attempts,
            tagged,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        info!(
            output = %outcome.output_path.display(),
            duration_ms = outcome.duration_ms,
            "Item processed"
        );
        Ok(outcome)
        // `scratch` drops here and removes the directory.
    }

    /// Download retry loop. Returns the number of attempts used.
    async fn download(&self, task: &PipelineTask) -> Result<u32, PipelineError> {
        let policy = self.config.download_backoff;
        let max_retries = self.config.download_max_retries.max(1);
        let mut state = RetryState::new(self.config.download_timeout);

        loop {
            let attempt = state.begin_attempt();
            let request = DownloadRequest {
                source: task.descriptor.id.clone(),
                name: task.descriptor.title.clone(),
                output_dir: task.scratch_dir.clone(),
                timeout: state.timeouts,
            };

            let error = match self.downloader.download(&request).await {
                Ok(output) => {
                    debug!(attempt, diagnostics = %output.diagnostics.trim(), "Download finished");
                    return Ok(attempt);
                }
                Err(e) => e,
            };

            warn!(attempt, max_retries, error = %error, "Download attempt failed");
            if attempt >= max_retries || !error.is_retryable() {
                return Err(PipelineError::DownloadExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let wait = state.record_failure(&policy);
            self.record_retry("download");
            debug!(wait_ms = wait.as_millis() as u64, next_timeout_secs = state.timeouts.as_secs_f64(), "Retrying download");
            clear_dir(&task.scratch_dir).await;
            sleep(wait).await;
        }
    }

    /// Conversion retry loop. Returns the output path and attempts used.
    async fn convert(
        &self,
        task: &PipelineTask,
        artifact: &Path,
    ) -> Result<(PathBuf, u32), PipelineError> {
        let policy = self.config.conversion_backoff;
        let max_retries = self.config.conversion_max_retries.max(1);
        let job = ConversionJob {
            input_path: artifact.to_path_buf(),
            output_path: self.output_path_for(&task.descriptor),
            format: self.config.audio_format,
            channels: self.config.channels,
            bitrate_kbps: self.config.bitrate_kbps,
        };
        let mut state = RetryState::new(Duration::ZERO);

        loop {
            let attempt = state.begin_attempt();
            let error = match self.converter.convert(&job).await {
                Ok(result) => {
                    debug!(attempt, bytes = result.output_size_bytes, "Conversion finished");
                    return Ok((result.output_path, attempt));
                }
                Err(e) => e,
            };

            warn!(attempt, max_retries, error = %error, "Conversion attempt failed");
            if attempt >= max_retries || !error.is_retryable() {
                // Never leave a partial file in the shared output directory.
                if tokio::fs::try_exists(&job.output_path).await.unwrap_or(false) {
                    if let Err(e) = tokio::fs::remove_file(&job.output_path).await {
                        warn!(path = %job.output_path.display(), error = %e, "Failed to remove partial output");
                    }
                }
                return Err(PipelineError::ConversionExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let wait = state.record_failure(&policy);
            self.record_retry("conversion");
            sleep(wait).await;
        }
    }

    fn record_retry(&self, stage: &str) {
        if let Some(metrics) = &self.metrics {
            metrics.record_retry(stage);
        }
    }
}

/// Removes whatever a failed attempt left in `dir`.
async fn clear_dir(dir: &Path) {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list scratch directory");
            return;
        }
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
        let path = entry.path();
        let removed = match entry.file_type().await {
            Ok(ft) if ft.is_dir() => tokio::fs::remove_dir_all(&path).await,
            _ => tokio::fs::remove_file(&path).await,
        };
        if let Err(e) = removed {
            warn!(path = %path.display(), error = %e, "Failed to remove leftover download");
        }
    }
}

/// Largest file left in the scratch directory.
async fn pick_artifact(dir: &Path) -> Result<PathBuf, PipelineError> {
    let files = list_files(dir).await.unwrap_or_default();
    let mut best: Option<(u64, PathBuf)> = None;
    for path in files {
        let size = tokio::fs::metadata(&path).await.map(|m| m.len()).unwrap_or(0);
        if best.as_ref().map_or(true, |(s, _)| size > *s) {
            best = Some((size, path));
        }
    }
    best.map(|(_, path)| path)
        .ok_or_else(|| PipelineError::NoDownloadedArtifact {
            dir: dir.to_path_buf(),
        })
}
