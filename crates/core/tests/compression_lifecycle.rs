//! Compression lifecycle integration tests.
//!
//! These tests drive the compression stage against the mock automation
//! driver:
//! - Exhausted sessions leave nothing behind
//! - Session concurrency stays within the pool bound
//! - Files already compressed are never submitted

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use musicdl_core::{
    compression::{CompressionConfig, CompressionError, Compressor, Stage, TimeoutTable},
    testing::{MockAutomationDriver, MockTagger},
    BackoffPolicy, Orchestrator,
};

struct Dirs {
    root: TempDir,
    input: PathBuf,
    output: PathBuf,
}

fn dirs() -> Dirs {
    let root = TempDir::new().unwrap();
    let input = root.path().join("OriginalAudio");
    let output = root.path().join("CompressedAudio");
    std::fs::create_dir_all(&input).unwrap();
    std::fs::create_dir_all(&output).unwrap();
    Dirs {
        root,
        input,
        output,
    }
}

fn compressor(dirs: &Dirs, driver: Arc<MockAutomationDriver>) -> Arc<Compressor> {
    Arc::new(
        Compressor::new(&CompressionConfig::default(), driver, Arc::new(MockTagger::new()))
            .with_timeouts(TimeoutTable::uniform(Duration::from_millis(150)))
            .with_backoff(BackoffPolicy::new(1.0, 0.0, 2.0, 1.0))
            .with_poll_interval(Duration::from_millis(5))
            .with_scratch_root(dirs.root.path().to_path_buf()),
    )
}

/// Untagged files are identified by size, so distinct sizes keep them apart.
fn write_inputs(dir: &Path, count: usize) {
    for i in 1..=count {
        std::fs::write(dir.join(format!("Song {i}.mp3")), vec![0u8; 100 + i]).unwrap();
    }
}

fn entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

#[tokio::test]
async fn test_await_result_timeouts_exhaust_retries() {
    let dirs = dirs();
    write_inputs(&dirs.input, 1);
    let driver = Arc::new(MockAutomationDriver::new().stall_at(Stage::AwaitResult));
    let compressor = compressor(&dirs, driver.clone());

    let task = compressor.task(
        dirs.input.join("Song 1.mp3"),
        dirs.output.clone(),
        "101".to_string(),
    );
    let err = compressor.compress(task).await.unwrap_err();

    match err {
        CompressionError::RetryExhausted { attempts, last_error } => {
            assert_eq!(attempts, 3);
            assert!(last_error.contains("await_result"), "{last_error}");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(driver.sessions_opened(), 3);
    assert_eq!(driver.sessions_closed(), 3);
    assert!(entries(&dirs.output).is_empty());
}

#[tokio::test]
async fn test_sessions_stay_within_pool_bound() {
    let dirs = dirs();
    write_inputs(&dirs.input, 6);
    let driver = Arc::new(MockAutomationDriver::new().with_delay(Duration::from_millis(30)));

    let report = Orchestrator::new(1, 2)
        .compress(compressor(&dirs, driver.clone()), &dirs.input, &dirs.output)
        .await
        .unwrap();

    assert_eq!(report.result.attempted, 6);
    assert_eq!(report.result.failed, 0);
    assert!(driver.peak_sessions() <= 2, "peak {}", driver.peak_sessions());
    assert_eq!(driver.sessions_opened(), driver.sessions_closed());
    assert_eq!(entries(&dirs.output).len(), 6);
    assert_eq!(entries(&dirs.output), entries(&dirs.input));
}

#[tokio::test]
async fn test_already_compressed_file_is_never_submitted() {
    let dirs = dirs();
    write_inputs(&dirs.input, 3);
    // Same size as "Song 2.mp3", so the same identity.
    std::fs::write(dirs.output.join("earlier.mp3"), vec![0u8; 102]).unwrap();
    let driver = Arc::new(MockAutomationDriver::new());

    let report = Orchestrator::new(1, 2)
        .compress(compressor(&dirs, driver.clone()), &dirs.input, &dirs.output)
        .await
        .unwrap();

    assert_eq!(report.already_present, 1);
    assert_eq!(report.result.submitted, 2);
    let uploads = driver.uploads();
    assert_eq!(uploads.len(), 2);
    assert!(uploads.iter().all(|u| !u.ends_with("Song 2.mp3")));
}

#[tokio::test]
async fn test_stalled_downloads_leave_no_output() {
    let dirs = dirs();
    write_inputs(&dirs.input, 3);
    let driver = Arc::new(MockAutomationDriver::new().stall_at(Stage::AwaitDownloadComplete));

    let report = Orchestrator::new(1, 3)
        .compress(compressor(&dirs, driver.clone()), &dirs.input, &dirs.output)
        .await
        .unwrap();

    assert_eq!(report.result.attempted, 3);
    assert_eq!(report.result.failed, 3);
    assert!(!report.result.is_success());
    assert_eq!(driver.sessions_opened(), 9);
    assert_eq!(driver.sessions_closed(), 9);
    assert!(entries(&dirs.output).is_empty());
}
