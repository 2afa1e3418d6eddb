//! Mock automation driver for testing.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::silent_mp3_bytes;
use crate::compression::{
    AutomationDriver, AutomationError, AutomationSession, ElementHandle, Locator, SessionOptions,
    SiteLocators, Stage, PARTIAL_DOWNLOAD_SUFFIX,
};

const UPLOAD: &str = "upload";
const SUBMIT: &str = "submit";
const RESULT: &str = "result";
const DOWNLOAD: &str = "download";

#[derive(Debug, Default)]
struct Counters {
    opened: AtomicUsize,
    closed: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

/// Mock implementation of the AutomationDriver trait.
///
/// Sessions play the remote site: the upload input and submit button appear
/// after navigation, the result marker and download link after submission,
/// and clicking the link drops the artifact into the session's download
/// directory. `stall_at` makes the element or file of one stage never
/// appear, so the attempt times out there.
///
/// # Example
///
/// ```rust,ignore
/// let driver = Arc::new(MockAutomationDriver::new().stall_at(Stage::AwaitResult));
/// // every session now times out waiting for the result marker
/// ```
#[derive(Debug)]
pub struct MockAutomationDriver {
    locators: SiteLocators,
    artifact: Vec<u8>,
    stall: Option<Stage>,
    /// Sessions that stall before later ones succeed. `None` stalls all.
    stalled_sessions: Option<usize>,
    fail_open: bool,
    open_delay: Duration,
    hang_on_quit: bool,
    delay: Duration,
    counters: Arc<Counters>,
    uploads: Arc<Mutex<Vec<String>>>,
}

impl Default for MockAutomationDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockAutomationDriver {
    pub fn new() -> Self {
        Self {
            locators: SiteLocators::default(),
            artifact: silent_mp3_bytes()[..417 * 10].to_vec(),
            stall: None,
            stalled_sessions: None,
            fail_open: false,
            open_delay: Duration::ZERO,
            hang_on_quit: false,
            delay: Duration::ZERO,
            counters: Arc::new(Counters::default()),
            uploads: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_locators(mut self, locators: SiteLocators) -> Self {
        self.locators = locators;
        self
    }

    /// Bytes of the downloaded artifact.
    pub fn with_artifact(mut self, artifact: Vec<u8>) -> Self {
        self.artifact = artifact;
        self
    }

    /// Every session stalls at `stage`.
    pub fn stall_at(mut self, stage: Stage) -> Self {
        self.stall = Some(stage);
        self
    }

    /// Only the first `sessions` sessions stall.
    pub fn stall_first(mut self, sessions: usize) -> Self {
        self.stalled_sessions = Some(sessions);
        self
    }

    /// Session creation fails.
    pub fn fail_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Session creation takes `delay`.
    pub fn with_open_delay(mut self, delay: Duration) -> Self {
        self.open_delay = delay;
        self
    }

    /// `quit` never returns and the session is never counted as closed.
    pub fn hang_on_quit(mut self) -> Self {
        self.hang_on_quit = true;
        self
    }

    /// Navigation takes `delay`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn sessions_opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously open sessions.
    pub fn peak_sessions(&self) -> usize {
        self.counters.peak.load(Ordering::SeqCst)
    }

    /// Text sent to the upload input, one entry per session.
    pub fn uploads(&self) -> Vec<String> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl AutomationDriver for MockAutomationDriver {
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn AutomationSession>, AutomationError> {
        if self.fail_open {
            return Err(AutomationError::SessionStart("mock driver refused".to_string()));
        }
        if !self.open_delay.is_zero() {
            tokio::time::sleep(self.open_delay).await;
        }

        let index = self.counters.opened.fetch_add(1, Ordering::SeqCst);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.counters.peak.fetch_max(active, Ordering::SeqCst);

        let stall = match self.stalled_sessions {
            Some(limit) if index >= limit => None,
            _ => self.stall,
        };

        Ok(Box::new(MockSession {
            locators: self.locators.clone(),
            artifact: self.artifact.clone(),
            stall,
            delay: self.delay,
            hang_on_quit: self.hang_on_quit,
            download_dir: options.download_dir.clone(),
            counters: self.counters.clone(),
            uploads: self.uploads.clone(),
            state: Mutex::new(PageState::default()),
        }))
    }
}

#[derive(Debug, Default)]
struct PageState {
    navigated: bool,
    submitted: bool,
}

struct MockSession {
    locators: SiteLocators,
    artifact: Vec<u8>,
    stall: Option<Stage>,
    delay: Duration,
    hang_on_quit: bool,
    download_dir: PathBuf,
    counters: Arc<Counters>,
    uploads: Arc<Mutex<Vec<String>>>,
    state: Mutex<PageState>,
}

impl MockSession {
    fn stalls_at(&self, stage: Stage) -> bool {
        self.stall == Some(stage)
    }
}

#[async_trait]
impl AutomationSession for MockSession {
    async fn navigate(&self, _url: &str) -> Result<(), AutomationError> {
        if self.stalls_at(Stage::NavigateTarget) {
            std::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.state.lock().unwrap().navigated = true;
        Ok(())
    }

    async fn find_element(
        &self,
        locator: &Locator,
    ) -> Result<Option<ElementHandle>, AutomationError> {
        let state = self.state.lock().unwrap();
        let found = if *locator == self.locators.upload_input {
            (state.navigated && !self.stalls_at(Stage::UploadSubmitted)).then_some(UPLOAD)
        } else if *locator == self.locators.submit_button {
            state.navigated.then_some(SUBMIT)
        } else if *locator == self.locators.result_marker {
            (state.submitted && !self.stalls_at(Stage::AwaitResult)).then_some(RESULT)
        } else if *locator == self.locators.download_link {
            (state.submitted && !self.stalls_at(Stage::LocateDownloadLink)).then_some(DOWNLOAD)
        } else {
            None
        };
        Ok(found.map(|id| ElementHandle(id.to_string())))
    }

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError> {
        if element.0 == UPLOAD {
            self.uploads.lock().unwrap().push(text.to_string());
        }
        Ok(())
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError> {
        match element.0.as_str() {
            SUBMIT => {
                self.state.lock().unwrap().submitted = true;
            }
            DOWNLOAD => {
                if self.stalls_at(Stage::AwaitDownloadStart) {
                    return Ok(());
                }
                let name = if self.stalls_at(Stage::AwaitDownloadComplete) {
                    format!("compressed.mp3{PARTIAL_DOWNLOAD_SUFFIX}")
                } else {
                    "compressed.mp3".to_string()
                };
                tokio::fs::write(self.download_dir.join(name), &self.artifact).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn quit(self: Box<Self>) -> Result<(), AutomationError> {
        if self.hang_on_quit {
            std::future::pending::<()>().await;
        }
        self.counters.active.fetch_sub(1, Ordering::SeqCst);
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
