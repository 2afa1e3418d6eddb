//! Automation seams: a driver opens sessions, a session drives one browser.

use async_trait::async_trait;
use std::path::PathBuf;

use super::error::AutomationError;
use super::types::Locator;

/// Opaque reference to an element of the current page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle(pub String);

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Directory the browser downloads into.
    pub download_dir: PathBuf,
}

/// Starts automation sessions.
#[async_trait]
pub trait AutomationDriver: Send + Sync {
    async fn open_session(
        &self,
        options: &SessionOptions,
    ) -> Result<Box<dyn AutomationSession>, AutomationError>;
}

/// One live browser session, exclusively owned by its attempt.
#[async_trait]
pub trait AutomationSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), AutomationError>;

    /// Looks `locator` up once. `Ok(None)` when it is not on the page yet.
    async fn find_element(&self, locator: &Locator)
        -> Result<Option<ElementHandle>, AutomationError>;

    async fn send_keys(&self, element: &ElementHandle, text: &str) -> Result<(), AutomationError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), AutomationError>;

    /// Ends the session and releases the browser.
    async fn quit(self: Box<Self>) -> Result<(), AutomationError>;
}
