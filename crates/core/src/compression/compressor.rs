//! Retry loop around the automation state machine.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::config::{CompressionConfig, SiteLocators};
use super::error::CompressionError;
use super::session::AutomationDriver;
use super::stages::{run_attempt, AttemptPlan};
use super::types::{CompressionOutcome, CompressionTask, TimeoutTable};
use crate::backoff::{BackoffPolicy, RetryState};
use crate::metrics::Metrics;
use crate::tagger::Tagger;

/// Compresses files through the remote service, one session per attempt.
pub struct Compressor {
    driver: Arc<dyn AutomationDriver>,
    tagger: Arc<dyn Tagger>,
    site_url: String,
    locators: SiteLocators,
    max_retries: u32,
    backoff: BackoffPolicy,
    timeouts: TimeoutTable,
    poll_interval: Duration,
    scratch_root: PathBuf,
    metrics: Option<Metrics>,
}

impl Compressor {
    pub fn new(
        config: &CompressionConfig,
        driver: Arc<dyn AutomationDriver>,
        tagger: Arc<dyn Tagger>,
    ) -> Self {
        Self {
            driver,
            tagger,
            site_url: config.site_url.clone(),
            locators: config.locators.clone(),
            max_retries: config.max_retries,
            backoff: config.backoff,
            timeouts: config.timeouts.into(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            scratch_root: std::env::temp_dir(),
            metrics: None,
        }
    }

    /// Overrides the initial timeout table.
    pub fn with_timeouts(mut self, timeouts: TimeoutTable) -> Self {
        self.timeouts = timeouts;
        self
    }

    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Parent of the per-attempt download directories.
    pub fn with_scratch_root(mut self, scratch_root: PathBuf) -> Self {
        self.scratch_root = scratch_root;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds a task for `input_path` with fresh timeouts.
    pub fn task(&self, input_path: PathBuf, output_dir: PathBuf, identifier: String) -> CompressionTask {
        CompressionTask {
            input_path,
            output_dir,
            identifier,
            timeouts: self.timeouts,
        }
    }

    /// Compresses one file into its output directory.
    ///
    /// Nothing is written to the output directory unless an attempt
    /// succeeds. The caller is responsible for dedup.
    pub async fn compress(&self, task: CompressionTask) -> Result<CompressionOutcome, CompressionError> {
        let start = Instant::now();

        if !tokio::fs::metadata(&task.input_path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
        {
            return Err(CompressionError::InputInvalid {
                path: task.input_path,
            });
        }
        if !tokio::fs::metadata(&task.output_dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
        {
            return Err(CompressionError::OutputInvalid {
                path: task.output_dir,
            });
        }
        let Some(file_name) = task.input_path.file_name().map(|n| n.to_os_string()) else {
            return Err(CompressionError::InputInvalid {
                path: task.input_path,
            });
        };

        info!(file = %task.input_path.display(), "Compression started");

        let max_retries = self.max_retries.max(1);
        let mut state = RetryState::new(task.timeouts);

        loop {
            let attempt = state.begin_attempt();
            let plan = AttemptPlan {
                site_url: &self.site_url,
                locators: &self.locators,
                input_path: &task.input_path,
                scratch_root: &self.scratch_root,
                poll_interval: self.poll_interval,
            };

            let error = match run_attempt(self.driver.as_ref(), &plan, &state.timeouts).await {
                Ok(artifact) => {
                    let target = task.output_dir.join(&file_name);
                    place(&artifact.path, &target).await?;
                    let marked = self.mark(&target, &task.identifier).await;

                    let outcome = CompressionOutcome {
                        output_path: target,
                        attempts: attempt,
                        marked,
                        duration_ms: start.elapsed().as_millis() as u64,
                    };
                    self.observe("success", start);
                    info!(
                        output = %outcome.output_path.display(),
                        attempts = attempt,
                        duration_ms = outcome.duration_ms,
                        "Compression finished"
                    );
                    return Ok(outcome);
                }
                Err(e) => e,
            };

            warn!(attempt, max_retries, error = %error, "Compression attempt failed");
            if attempt >= max_retries {
                self.observe("failure", start);
                return Err(CompressionError::RetryExhausted {
                    attempts: attempt,
                    last_error: error.to_string(),
                });
            }

            let wait = state.record_failure(&self.backoff);
            if let Some(metrics) = &self.metrics {
                metrics.record_retry("compression");
            }
            debug!(
                wait_secs = wait.as_secs_f64(),
                load_secs = state.timeouts.load.as_secs_f64(),
                compress_secs = state.timeouts.compress.as_secs_f64(),
                completion_secs = state.timeouts.completion.as_secs_f64(),
                "Retrying compression with escalated timeouts"
            );
            sleep(wait).await;
        }
    }

    /// Confirms the completion marker on `path`. Failures are not fatal.
    async fn mark(&self, path: &Path, identifier: &str) -> bool {
        match self.tagger.ensure_identity(path, identifier).await {
            Ok(outcome) => {
                debug!(path = %path.display(), ?outcome, "Completion marker confirmed");
                true
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to write completion marker");
                false
            }
        }
    }

    fn observe(&self, result: &str, start: Instant) {
        if let Some(metrics) = &self.metrics {
            metrics.observe_session(result, start.elapsed().as_secs_f64());
        }
    }
}

/// Copies `artifact` to `target` through a hidden temporary name in the
/// same directory, so `target` only ever appears complete.
async fn place(artifact: &Path, target: &Path) -> Result<(), CompressionError> {
    let copy_error = |source| CompressionError::Copy {
        from: artifact.to_path_buf(),
        to: target.to_path_buf(),
        source,
    };

    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = dir.join(format!(".{name}.part"));

    if let Err(e) = tokio::fs::copy(artifact, &temp).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(copy_error(e));
    }
    if let Err(e) = tokio::fs::rename(&temp, target).await {
        let _ = tokio::fs::remove_file(&temp).await;
        return Err(copy_error(e));
    }
    Ok(())
}
