//! Mock downloader for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::downloader::{DownloadError, DownloadOutput, DownloadRequest, Downloader};

/// Mock implementation of the Downloader trait.
///
/// Successful attempts write `<name>.flv` into the request's output
/// directory. Failures can be scripted per source:
/// - `fail_times` fails the first N attempts, then succeeds
/// - `fail_always` never succeeds
/// - `leave_partial` makes failed attempts leave a large `.part` file behind
///
/// Every attempt is recorded with the timeout it was given.
#[derive(Debug, Default)]
pub struct MockDownloader {
    remaining_failures: Mutex<HashMap<String, u32>>,
    always_failing: Mutex<HashSet<String>>,
    attempts: Arc<Mutex<Vec<DownloadRequest>>>,
    produce_nothing: AtomicBool,
    leave_partial: AtomicBool,
    delay: Mutex<Duration>,
}

impl MockDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the first `times` attempts for `source`.
    pub fn fail_times(&self, source: &str, times: u32) {
        self.remaining_failures
            .lock()
            .unwrap()
            .insert(source.to_string(), times);
    }

    /// Fails every attempt for `source`.
    pub fn fail_always(&self, source: &str) {
        self.always_failing.lock().unwrap().insert(source.to_string());
    }

    /// Succeed without writing any file.
    pub fn produce_nothing(&self) {
        self.produce_nothing.store(true, Ordering::SeqCst);
    }

    /// Sleeps for `delay` in every attempt.
    /// Failed attempts leave a partial file in the output directory.
    pub fn leave_partial(&self) {
        self.leave_partial.store(true, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    /// Number of attempts made for `source`.
    pub fn attempts(&self, source: &str) -> u32 {
        self.requests_for(source).len() as u32
    }

    /// Timeouts passed to each attempt for `source`, in order.
    pub fn timeouts(&self, source: &str) -> Vec<Duration> {
        self.requests_for(source)
            .into_iter()
            .map(|r| r.timeout)
            .collect()
    }

    /// Total attempts across all sources.
    pub fn total_attempts(&self) -> usize {
        self.attempts.lock().unwrap().len()
    }

    fn requests_for(&self, source: &str) -> Vec<DownloadRequest> {
        self.attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.source == source)
            .cloned()
            .collect()
    }

    fn should_fail(&self, source: &str) -> bool {
        if self.always_failing.lock().unwrap().contains(source) {
            return true;
        }
        let mut remaining = self.remaining_failures.lock().unwrap();
        match remaining.get_mut(source) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl Downloader for MockDownloader {
    fn name(&self) -> &str {
        "mock"
    }

    async fn download(&self, request: &DownloadRequest) -> Result<DownloadOutput, DownloadError> {
        self.attempts.lock().unwrap().push(request.clone());

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.should_fail(&request.source) {
            if self.leave_partial.load(Ordering::SeqCst) {
                let path = request.output_dir.join(format!("{}.flv.part", request.name));
                tokio::fs::write(&path, vec![0u8; 4096]).await?;
            }
            return Err(DownloadError::ProcessFailed {
                code: Some(1),
                stderr: Some(format!("mock failure for {}", request.source)),
            });
        }

        if !self.produce_nothing.load(Ordering::SeqCst) {
            let path = request.output_dir.join(format!("{}.flv", request.name));
            tokio::fs::write(&path, request.source.as_bytes()).await?;
        }

        Ok(DownloadOutput {
            diagnostics: format!("mock download of {}", request.source),
        })
    }
}
