//! Mock converter for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use super::silent_mp3_bytes;
use crate::converter::{ConversionJob, ConversionResult, Converter, ConverterError};

/// Mock implementation of the Converter trait.
///
/// A successful conversion writes a silent MP3 to the job's output path so
/// the result can be tagged for real. A failing conversion leaves a
/// truncated file behind, as an interrupted ffmpeg would.
#[derive(Debug, Default)]
pub struct MockConverter {
    calls: AtomicUsize,
    fail_always: AtomicBool,
    jobs: Mutex<Vec<ConversionJob>>,
}

impl MockConverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every conversion.
    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    /// Number of conversions attempted.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Jobs submitted so far.
    pub fn recorded_jobs(&self) -> Vec<ConversionJob> {
        self.jobs.lock().unwrap().clone()
    }
}

#[async_trait]
impl Converter for MockConverter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn convert(&self, job: &ConversionJob) -> Result<ConversionResult, ConverterError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.jobs.lock().unwrap().push(job.clone());

        if !job.input_path.exists() {
            return Err(ConverterError::InputNotFound {
                path: job.input_path.clone(),
            });
        }

        if self.fail_always.load(Ordering::SeqCst) {
            tokio::fs::write(&job.output_path, b"partial").await?;
            return Err(ConverterError::conversion_failed("mock failure", None));
        }

        let data = silent_mp3_bytes();
        tokio::fs::write(&job.output_path, &data).await?;
        Ok(ConversionResult {
            output_path: job.output_path.clone(),
            output_size_bytes: data.len() as u64,
            duration_ms: 0,
        })
    }

    async fn validate(&self) -> Result<(), ConverterError> {
        Ok(())
    }
}
