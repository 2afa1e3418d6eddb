//! Orchestrator lifecycle integration tests.
//!
//! These tests run whole stages with mock tools and the real tagger:
//! - Acquisition skips titles already present in the output directory
//! - Cancellation reports unstarted items as skipped
//! - A second run over the same data does no work

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use musicdl_core::{
    catalog::{Catalog, CatalogError, MediaDescriptor},
    compression::{CompressionConfig, Compressor, TimeoutTable},
    identity::read_provenance,
    naming::{extract_names, NamingConfig},
    processor::{ItemPipeline, PipelineConfig},
    tagger::{LoftyTagger, Tagger},
    testing::{
        write_silent_mp3, MockAutomationDriver, MockCatalog, MockConverter, MockDownloader,
    },
    BackoffPolicy, Orchestrator,
};

/// Test helper holding both stages wired to mocks.
struct TestHarness {
    root: TempDir,
    original: PathBuf,
    compressed: PathBuf,
    downloader: Arc<MockDownloader>,
    driver: Arc<MockAutomationDriver>,
    pipeline: Arc<ItemPipeline>,
    compressor: Arc<Compressor>,
}

impl TestHarness {
    fn new() -> Self {
        let root = TempDir::new().unwrap();
        let original = root.path().join("OriginalAudio");
        let compressed = root.path().join("CompressedAudio");
        let scratch = root.path().join("scratch");
        for dir in [&original, &compressed, &scratch] {
            std::fs::create_dir_all(dir).unwrap();
        }

        let downloader = Arc::new(MockDownloader::new());
        let driver = Arc::new(MockAutomationDriver::new());
        let tagger: Arc<dyn Tagger> = Arc::new(LoftyTagger::new());

        let pipeline = Arc::new(ItemPipeline::new(
            PipelineConfig::new(original.clone())
                .with_scratch_root(scratch.clone())
                .with_backoff(BackoffPolicy::new(1.0, 0.0, 1.5, 600.0)),
            downloader.clone(),
            Arc::new(MockConverter::new()),
            tagger.clone(),
        ));
        let compressor = Arc::new(
            Compressor::new(&CompressionConfig::default(), driver.clone(), tagger)
                .with_timeouts(TimeoutTable::uniform(Duration::from_millis(200)))
                .with_backoff(BackoffPolicy::new(1.0, 0.0, 2.0, 1.0))
                .with_poll_interval(Duration::from_millis(5))
                .with_scratch_root(scratch),
        );

        Self {
            root,
            original,
            compressed,
            downloader,
            driver,
            pipeline,
            compressor,
        }
    }

    fn files(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

#[tokio::test]
async fn test_acquisition_skips_present_and_repeated_titles() {
    let harness = TestHarness::new();
    let existing = harness.original.join("renamed.mp3");
    write_silent_mp3(&existing);
    LoftyTagger::new()
        .ensure_identity(&existing, "Song A")
        .await
        .unwrap();

    let descriptors = vec![
        MediaDescriptor::new("BV1", "Song A"),
        MediaDescriptor::new("BV2", "Song B"),
        MediaDescriptor::new("BV3", "Song B"),
    ];
    let report = Orchestrator::new(2, 1)
        .acquire(harness.pipeline.clone(), descriptors)
        .await
        .unwrap();

    assert_eq!(report.already_present, 1);
    assert_eq!(report.duplicates, 1);
    assert_eq!(report.result.submitted, 1);
    assert_eq!(harness.downloader.attempts("BV1"), 0);
    assert_eq!(harness.downloader.attempts("BV2"), 1);
    assert_eq!(harness.downloader.attempts("BV3"), 0);
    assert_eq!(
        TestHarness::files(&harness.original),
        vec!["Song B.mp3", "renamed.mp3"]
    );
}

#[tokio::test]
async fn test_catalog_feeds_acquisition() {
    let harness = TestHarness::new();
    let catalog = MockCatalog::new(vec![
        MediaDescriptor::new("BV1", "First"),
        MediaDescriptor::new("BV2", "Second"),
    ]);

    let descriptors = catalog.fetch().await.unwrap();
    let report = Orchestrator::new(2, 1)
        .acquire(harness.pipeline.clone(), descriptors)
        .await
        .unwrap();

    assert_eq!(catalog.fetch_count(), 1);
    assert_eq!(report.result.succeeded(), 2);
    assert_eq!(
        TestHarness::files(&harness.original),
        vec!["First.mp3", "Second.mp3"]
    );
}

#[tokio::test]
async fn test_catalog_failure_is_reported() {
    let catalog = MockCatalog::new(vec![MediaDescriptor::new("BV1", "First")]);
    catalog.fail_always();

    let err = catalog.fetch().await.unwrap_err();
    assert!(matches!(err, CatalogError::RetryExhausted { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_cancelled_run_reports_skipped_items() {
    let harness = TestHarness::new();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let descriptors = vec![
        MediaDescriptor::new("BV1", "One"),
        MediaDescriptor::new("BV2", "Two"),
        MediaDescriptor::new("BV3", "Three"),
    ];
    let report = Orchestrator::new(2, 1)
        .with_cancellation(cancel)
        .acquire(harness.pipeline.clone(), descriptors)
        .await
        .unwrap();

    assert_eq!(report.result.attempted, 0);
    assert_eq!(report.result.skipped, 3);
    assert_eq!(
        report.result.attempted + report.result.skipped,
        report.result.submitted
    );
    assert_eq!(harness.downloader.total_attempts(), 0);
}

#[tokio::test]
async fn test_full_run_is_idempotent() {
    let harness = TestHarness::new();
    let descriptors = vec![
        MediaDescriptor::new("BV1", "《Alpha》【Live】"),
        MediaDescriptor::new("BV2", "Beta (Remix)"),
        MediaDescriptor::new("BV3", "Gamma"),
    ];
    let orchestrator = Orchestrator::new(3, 2);

    let acquired = orchestrator
        .acquire(harness.pipeline.clone(), descriptors.clone())
        .await
        .unwrap();
    assert_eq!(acquired.result.succeeded(), 3);

    let naming = NamingConfig::default();
    let renamed = extract_names(&harness.original, &naming.patterns, &naming.invalid_labels)
        .await
        .unwrap();
    assert_eq!(renamed.renamed, 2);
    assert_eq!(renamed.unmatched, 1);
    assert_eq!(
        TestHarness::files(&harness.original),
        vec!["Gamma.mp3", "alpha - live.mp3", "remix.mp3"]
    );

    let compressed = orchestrator
        .compress(harness.compressor.clone(), &harness.original, &harness.compressed)
        .await
        .unwrap();
    assert_eq!(compressed.result.succeeded(), 3);
    assert_eq!(
        read_provenance(&harness.compressed.join("alpha - live.mp3"))
            .unwrap()
            .as_deref(),
        Some("《Alpha》【Live】")
    );

    // Renaming kept the identities, so nothing is fetched or compressed again.
    let downloads = harness.downloader.total_attempts();
    let sessions = harness.driver.sessions_opened();

    let again = orchestrator
        .acquire(harness.pipeline.clone(), descriptors)
        .await
        .unwrap();
    assert_eq!(again.already_present, 3);
    assert_eq!(again.result.submitted, 0);

    let again = orchestrator
        .compress(harness.compressor.clone(), &harness.original, &harness.compressed)
        .await
        .unwrap();
    assert_eq!(again.already_present, 3);
    assert_eq!(again.result.submitted, 0);

    assert_eq!(harness.downloader.total_attempts(), downloads);
    assert_eq!(harness.driver.sessions_opened(), sessions);
    assert!(harness.root.path().join("scratch").read_dir().unwrap().next().is_none());
}
