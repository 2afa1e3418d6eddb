//! State machine driving one compression attempt.
//!
//! `Init → SessionOpen → NavigateTarget → UploadSubmitted → AwaitResult →
//! LocateDownloadLink → AwaitDownloadStart → AwaitDownloadComplete → Finalize`
//!
//! Every transition is bounded by the attempt's timeout for the stage. The
//! session is quit on every exit path once it was opened, including one
//! the driver hands over after SessionOpen already timed out. Quitting is
//! bounded by the Load budget.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tempfile::TempDir;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::config::SiteLocators;
use super::error::AutomationError;
use super::session::{AutomationDriver, AutomationSession, ElementHandle, SessionOptions};
use super::types::{Locator, Stage, TimeoutKind, TimeoutTable};

/// Suffix of a partial browser download.
pub const PARTIAL_DOWNLOAD_SUFFIX: &str = ".crdownload";

/// Fixed inputs of an attempt.
#[derive(Debug, Clone)]
pub struct AttemptPlan<'a> {
    pub site_url: &'a str,
    pub locators: &'a SiteLocators,
    pub input_path: &'a Path,
    pub scratch_root: &'a Path,
    pub poll_interval: Duration,
}

/// Artifact produced by a successful attempt.
///
/// The artifact lives in the attempt's transient download directory, which
/// is removed when this value is dropped.
#[derive(Debug)]
pub struct AttemptArtifact {
    pub path: PathBuf,
    _download_dir: TempDir,
}

/// Runs the state machine once.
pub async fn run_attempt(
    driver: &dyn AutomationDriver,
    plan: &AttemptPlan<'_>,
    timeouts: &TimeoutTable,
) -> Result<AttemptArtifact, AutomationError> {
    // Init
    let download_dir = tempfile::Builder::new()
        .prefix("musicdl-compress-")
        .tempdir_in(plan.scratch_root)?;
    let options = SessionOptions {
        download_dir: download_dir.path().to_path_buf(),
    };

    let session = open_session(driver, &options, timeouts).await?;
    debug!(stage = %Stage::SessionOpen, "Session opened");

    let result = drive(session.as_ref(), plan, timeouts, download_dir.path()).await;

    release(session, timeouts.get(TimeoutKind::Load)).await;

    let path = result?;
    Ok(AttemptArtifact {
        path,
        _download_dir: download_dir,
    })
}

/// Stages between an open session and the finished download.
async fn drive(
    session: &dyn AutomationSession,
    plan: &AttemptPlan<'_>,
    timeouts: &TimeoutTable,
    download_dir: &Path,
) -> Result<PathBuf, AutomationError> {
    let mut stage = Stage::NavigateTarget;

    loop {
        debug!(stage = %stage, "Entering stage");
        match stage {
            Stage::NavigateTarget => {
                bounded(stage, timeouts, session.navigate(plan.site_url)).await?;
            }
            Stage::UploadSubmitted => {
                let input_path = plan.input_path.to_string_lossy();
                let upload = wait_for_element(session, stage, &plan.locators.upload_input, timeouts, plan.poll_interval)
                    .await?;
                bounded(stage, timeouts, session.send_keys(&upload, &input_path)).await?;
                let submit = wait_for_element(session, stage, &plan.locators.submit_button, timeouts, plan.poll_interval)
                    .await?;
                bounded(stage, timeouts, session.click(&submit)).await?;
            }
            Stage::AwaitResult => {
                wait_for_element(session, stage, &plan.locators.result_marker, timeouts, plan.poll_interval)
                    .await?;
            }
            Stage::LocateDownloadLink => {
                let link = wait_for_element(session, stage, &plan.locators.download_link, timeouts, plan.poll_interval)
                    .await?;
                bounded(stage, timeouts, session.click(&link)).await?;
            }
            Stage::AwaitDownloadStart => {
                poll_dir(stage, timeouts, plan.poll_interval, download_dir, |state| {
                    state.partial > 0 || state.finished > 0
                })
                .await?;
            }
            Stage::AwaitDownloadComplete => {
                poll_dir(stage, timeouts, plan.poll_interval, download_dir, |state| {
                    state.partial == 0 && state.finished > 0
                })
                .await?;
            }
            Stage::Finalize => {
                return newest_finished(download_dir).await?.ok_or_else(|| {
                    AutomationError::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        "download directory is empty",
                    ))
                });
            }
            Stage::Init | Stage::SessionOpen => {}
        }

        stage = stage.next().unwrap_or(Stage::Finalize);
    }
}

/// Opens a session within the SessionOpen budget.
///
/// A session the driver delivers after the budget ran out is still waited
/// for, once more for the same budget, and quit straight away.
async fn open_session(
    driver: &dyn AutomationDriver,
    options: &SessionOptions,
    timeouts: &TimeoutTable,
) -> Result<Box<dyn AutomationSession>, AutomationError> {
    let stage = Stage::SessionOpen;
    let limit = timeouts.get(stage.timeout_kind());
    let mut open = driver.open_session(options);

    match timeout(limit, &mut open).await {
        Ok(result) => result,
        Err(_) => {
            debug!(stage = %stage, "Session open timed out, waiting for a late session");
            match timeout(limit, &mut open).await {
                Ok(Ok(late)) => release(late, limit).await,
                Ok(Err(e)) => debug!(error = %e, "Late session open failed"),
                Err(_) => warn!(
                    timeout_secs = limit.as_secs_f64(),
                    "Session open abandoned, the browser may outlive this attempt"
                ),
            }
            Err(AutomationError::StageTimeout {
                stage,
                timeout: limit,
            })
        }
    }
}

/// Quits `session`, giving up after `limit`.
async fn release(session: Box<dyn AutomationSession>, limit: Duration) {
    match timeout(limit, session.quit()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "Failed to quit automation session"),
        Err(_) => warn!(
            timeout_secs = limit.as_secs_f64(),
            "Automation session did not quit in time"
        ),
    }
}

/// Runs `fut` within the stage's budget.
async fn bounded<T, F>(stage: Stage, timeouts: &TimeoutTable, fut: F) -> Result<T, AutomationError>
where
    F: Future<Output = Result<T, AutomationError>>,
{
    let limit = timeouts.get(stage.timeout_kind());
    let result = match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(AutomationError::StageTimeout {
            stage,
            timeout: limit,
        }),
    };
    if let Err(e) = &result {
        debug!(stage = %stage, error = %e, "Stage failed");
    }
    result
}

/// Polls `locator` until it is present or the stage budget runs out.
async fn wait_for_element(
    session: &dyn AutomationSession,
    stage: Stage,
    locator: &Locator,
    timeouts: &TimeoutTable,
    poll_interval: Duration,
) -> Result<ElementHandle, AutomationError> {
    bounded(stage, timeouts, async {
        loop {
            if let Some(element) = session.find_element(locator).await? {
                return Ok::<_, AutomationError>(element);
            }
            sleep(poll_interval).await;
        }
    })
    .await
}

#[derive(Debug, Default, Clone, Copy)]
struct DirState {
    partial: usize,
    finished: usize,
}

async fn dir_state(dir: &Path) -> Result<DirState, AutomationError> {
    let mut state = DirState::default();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(PARTIAL_DOWNLOAD_SUFFIX) {
            state.partial += 1;
        } else if !name.starts_with('.') {
            state.finished += 1;
        }
    }
    Ok(state)
}

async fn poll_dir<P>(
    stage: Stage,
    timeouts: &TimeoutTable,
    poll_interval: Duration,
    dir: &Path,
    done: P,
) -> Result<(), AutomationError>
where
    P: Fn(DirState) -> bool,
{
    bounded(stage, timeouts, async {
        loop {
            if done(dir_state(dir).await?) {
                return Ok::<_, AutomationError>(());
            }
            sleep(poll_interval).await;
        }
    })
    .await
}

/// Most recently modified finished file in `dir`.
async fn newest_finished(dir: &Path) -> Result<Option<PathBuf>, AutomationError> {
    let mut newest: Option<(SystemTime, PathBuf)> = None;
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.ends_with(PARTIAL_DOWNLOAD_SUFFIX) || name.starts_with('.') {
            continue;
        }
        let meta = entry.metadata().await?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);
        if newest.as_ref().map_or(true, |(t, _)| modified >= *t) {
            newest = Some((modified, entry.path()));
        }
    }
    Ok(newest.map(|(_, path)| path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockAutomationDriver;

    struct Fixture {
        root: TempDir,
        input: PathBuf,
        locators: SiteLocators,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let input = root.path().join("Song.mp3");
        std::fs::write(&input, b"original").unwrap();
        Fixture {
            root,
            input,
            locators: SiteLocators::default(),
        }
    }

    fn plan(f: &Fixture) -> AttemptPlan<'_> {
        AttemptPlan {
            site_url: "https://compress.example/",
            locators: &f.locators,
            input_path: &f.input,
            scratch_root: f.root.path(),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn fast() -> TimeoutTable {
        TimeoutTable::uniform(Duration::from_millis(100))
    }

    #[tokio::test]
    async fn test_successful_attempt_returns_artifact() {
        let f = fixture();
        let driver = MockAutomationDriver::new().with_artifact(b"compressed".to_vec());

        let artifact = run_attempt(&driver, &plan(&f), &fast()).await.unwrap();

        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"compressed");
        assert_eq!(driver.uploads(), vec![f.input.to_string_lossy().into_owned()]);
        assert_eq!(driver.sessions_opened(), 1);
        assert_eq!(driver.sessions_closed(), 1);
    }

    #[tokio::test]
    async fn test_stall_reports_stage_and_quits_session() {
        for stage in [
            Stage::NavigateTarget,
            Stage::UploadSubmitted,
            Stage::AwaitResult,
            Stage::LocateDownloadLink,
            Stage::AwaitDownloadStart,
            Stage::AwaitDownloadComplete,
        ] {
            let f = fixture();
            let driver = MockAutomationDriver::new().stall_at(stage);

            let err = run_attempt(&driver, &plan(&f), &fast()).await.unwrap_err();

            assert_eq!(err.stage(), Some(stage), "unexpected error {err}");
            assert!(matches!(err, AutomationError::StageTimeout { .. }));
            assert_eq!(driver.sessions_closed(), 1, "session leaked at {stage}");
        }
    }

    #[tokio::test]
    async fn test_session_start_failure_opens_nothing() {
        let f = fixture();
        let driver = MockAutomationDriver::new().fail_open();

        let err = run_attempt(&driver, &plan(&f), &fast()).await.unwrap_err();

        assert!(matches!(err, AutomationError::SessionStart(_)));
        assert_eq!(driver.sessions_closed(), 0);
    }

    #[tokio::test]
    async fn test_hanging_quit_does_not_block_attempt() {
        let f = fixture();
        let driver = MockAutomationDriver::new()
            .stall_at(Stage::NavigateTarget)
            .hang_on_quit();

        let finished = timeout(Duration::from_secs(3), run_attempt(&driver, &plan(&f), &fast())).await;

        let err = finished.expect("attempt hung on quit").unwrap_err();
        assert_eq!(err.stage(), Some(Stage::NavigateTarget));
        assert_eq!(driver.sessions_opened(), 1);
    }

    #[tokio::test]
    async fn test_late_session_is_quit() {
        let f = fixture();
        let driver = MockAutomationDriver::new().with_open_delay(Duration::from_millis(150));

        let err = run_attempt(&driver, &plan(&f), &fast()).await.unwrap_err();

        assert_eq!(err.stage(), Some(Stage::SessionOpen));
        assert!(matches!(err, AutomationError::StageTimeout { .. }));
        assert_eq!(driver.sessions_opened(), 1);
        assert_eq!(driver.sessions_closed(), 1);
        assert!(driver.uploads().is_empty());
    }

    #[tokio::test]
    async fn test_download_dir_removed_after_failure() {
        let f = fixture();
        let driver = MockAutomationDriver::new().stall_at(Stage::AwaitDownloadComplete);

        run_attempt(&driver, &plan(&f), &fast()).await.unwrap_err();

        let leftovers: Vec<_> = std::fs::read_dir(f.root.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().starts_with("musicdl-compress-"))
            .collect();
        assert!(leftovers.is_empty());
    }
}
