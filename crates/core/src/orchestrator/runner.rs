//! Orchestrator implementation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, Instrument};

use crate::catalog::MediaDescriptor;
use crate::compression::Compressor;
use crate::identity::{existing_identifiers, identifier, list_files};
use crate::metrics::Metrics;
use crate::pool::WorkerPool;
use crate::processor::ItemPipeline;

use super::types::{OrchestratorError, StageReport};

/// Files resolved concurrently while planning compression.
const PLAN_CONCURRENCY: usize = 8;

/// A file selected for compression with its identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompressionCandidate {
    pub path: PathBuf,
    pub identifier: String,
}

/// Schedules acquisition and compression work on bounded pools.
pub struct Orchestrator {
    acquisition_workers: usize,
    compression_workers: usize,
    cancel: CancellationToken,
    metrics: Option<Metrics>,
}

impl Orchestrator {
    /// Creates an orchestrator with the given pool bounds.
    pub fn new(acquisition_workers: usize, compression_workers: usize) -> Self {
        Self {
            acquisition_workers,
            compression_workers,
            cancel: CancellationToken::new(),
            metrics: None,
        }
    }

    /// Stops admitting new items once `cancel` fires.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    fn pool(&self, name: &'static str, bound: usize) -> WorkerPool {
        let pool = WorkerPool::new(name, bound).with_cancellation(self.cancel.clone());
        match &self.metrics {
            Some(metrics) => pool.with_metrics(metrics.clone()),
            None => pool,
        }
    }

    /// Runs the acquisition pipeline for every new descriptor.
    ///
    /// Descriptors whose title is already an identifier in the pipeline's
    /// output directory are skipped, as are repeated titles within the batch.
    pub async fn acquire(
        &self,
        pipeline: Arc<ItemPipeline>,
        descriptors: Vec<MediaDescriptor>,
    ) -> Result<StageReport, OrchestratorError> {
        let output_dir = pipeline.config().output_dir.clone();
        require_dir(&output_dir)?;

        let mut report = StageReport::new("acquisition");
        let existing = existing_identifiers(&output_dir).await;
        let mut seen = HashSet::new();
        let mut queue = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if existing.contains(&descriptor.title) {
                debug!(item = %descriptor.id, title = %descriptor.title, "Already downloaded");
                report.already_present += 1;
            } else if !seen.insert(descriptor.title.clone()) {
                debug!(item = %descriptor.id, title = %descriptor.title, "Duplicate title in batch");
                report.duplicates += 1;
            } else {
                queue.push(descriptor);
            }
        }

        info!(
            queued = queue.len(),
            already_present = report.already_present,
            duplicates = report.duplicates,
            "Acquisition planned"
        );

        let pool = self.pool("acquisition", self.acquisition_workers);
        report.result = pool
            .run(queue, |descriptor: MediaDescriptor| {
                let pipeline = pipeline.clone();
                let span = info_span!("acquire", item = %descriptor.id);
                async move { pipeline.run(&descriptor).await }.instrument(span)
            })
            .await;

        Ok(report)
    }

    /// Selects the files of `input_dir` that still need compressing.
    ///
    /// The identifier set of `output_dir` is computed exactly once. Files
    /// are visited in name order and the first file of each identity wins.
    pub async fn plan_compression(
        &self,
        input_dir: &Path,
        output_dir: &Path,
        report: &mut StageReport,
    ) -> Result<Vec<CompressionCandidate>, OrchestratorError> {
        require_dir(input_dir)?;
        require_dir(output_dir)?;

        let existing = existing_identifiers(output_dir).await;
        let files = list_files(input_dir)
            .await
            .map_err(|e| OrchestratorError::PathInvalid {
                path: input_dir.to_path_buf(),
                reason: e.to_string(),
            })?;

        let resolved: Vec<CompressionCandidate> = stream::iter(files)
            .map(|path| async move {
                let identifier = identifier(&path).await;
                CompressionCandidate { path, identifier }
            })
            .buffered(PLAN_CONCURRENCY)
            .collect()
            .await;

        let mut seen = HashSet::new();
        let mut selected = Vec::new();
        for candidate in resolved {
            if existing.contains(&candidate.identifier) {
                debug!(file = %candidate.path.display(), "Already compressed");
                report.already_present += 1;
            } else if !seen.insert(candidate.identifier.clone()) {
                debug!(
                    file = %candidate.path.display(),
                    identifier = %candidate.identifier,
                    "Same identity as an earlier file"
                );
                report.duplicates += 1;
            } else {
                selected.push(candidate);
            }
        }
        Ok(selected)
    }

    /// Compresses every file of `input_dir` not yet represented in
    /// `output_dir`.
    pub async fn compress(
        &self,
        compressor: Arc<Compressor>,
        input_dir: &Path,
        output_dir: &Path,
    ) -> Result<StageReport, OrchestratorError> {
        let mut report = StageReport::new("compression");
        let candidates = self
            .plan_compression(input_dir, output_dir, &mut report)
            .await?;

        info!(
            queued = candidates.len(),
            already_present = report.already_present,
            duplicates = report.duplicates,
            "Compression planned"
        );

        let output_dir = output_dir.to_path_buf();
        let pool = self.pool("compression", self.compression_workers);
        report.result = pool
            .run(candidates, |candidate: CompressionCandidate| {
                let compressor = compressor.clone();
                let span = info_span!("compress", file = %candidate.path.display());
                let task = compressor.task(candidate.path, output_dir.clone(), candidate.identifier);
                async move { compressor.compress(task).await }.instrument(span)
            })
            .await;

        Ok(report)
    }
}

fn require_dir(path: &Path) -> Result<(), OrchestratorError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(OrchestratorError::PathInvalid {
            path: path.to_path_buf(),
            reason: "not a directory".to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::write_silent_mp3;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_plan_skips_present_and_duplicate_identities() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();

        std::fs::write(input.join("a.mp3"), vec![0u8; 10]).unwrap();
        std::fs::write(input.join("b.mp3"), vec![0u8; 10]).unwrap();
        std::fs::write(input.join("c.mp3"), vec![0u8; 30]).unwrap();
        std::fs::write(input.join("d.mp3"), vec![0u8; 40]).unwrap();
        std::fs::write(output.join("old.mp3"), vec![0u8; 30]).unwrap();

        let orchestrator = Orchestrator::new(1, 1);
        let mut report = StageReport::new("compression");
        let plan = orchestrator
            .plan_compression(&input, &output, &mut report)
            .await
            .unwrap();

        let names: Vec<_> = plan
            .iter()
            .map(|c| c.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.mp3", "d.mp3"]);
        assert_eq!(report.already_present, 1);
        assert_eq!(report.duplicates, 1);
    }

    #[tokio::test]
    async fn test_plan_falls_back_to_size_for_untagged_audio() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in");
        let output = dir.path().join("out");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::create_dir_all(&output).unwrap();
        write_silent_mp3(&input.join("song.mp3"));

        let orchestrator = Orchestrator::new(1, 1);
        let mut report = StageReport::new("compression");
        let plan = orchestrator
            .plan_compression(&input, &output, &mut report)
            .await
            .unwrap();

        assert_eq!(plan.len(), 1);
        let size = std::fs::metadata(input.join("song.mp3")).unwrap().len();
        assert_eq!(plan[0].identifier, size.to_string());
    }

    #[tokio::test]
    async fn test_missing_directory_is_fatal() {
        let dir = TempDir::new().unwrap();
        let orchestrator = Orchestrator::new(1, 1);
        let mut report = StageReport::new("compression");

        let err = orchestrator
            .plan_compression(&dir.path().join("missing"), dir.path(), &mut report)
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::PathInvalid { .. }));
    }
}
