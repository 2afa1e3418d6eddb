//! Compression module: shrinks produced files through a remote web service.
//!
//! The service is only reachable through its UI, so every attempt drives a
//! browser session through a fixed sequence of stages (see [`Stage`]). The
//! [`Compressor`] wraps that state machine in a bounded retry loop with
//! escalating per-stage timeouts:
//!
//! 1. Validate the input file and output directory
//! 2. Run one attempt; the browser session is always quit afterwards
//! 3. On failure wait, escalate every timeout in the table, and retry
//! 4. On success place the artifact under the input's file name and write
//!    the completion marker
//!
//! Dedup happens before a task is built; the compressor never checks
//! whether the output already exists.

mod compressor;
mod config;
mod error;
mod session;
mod stages;
mod types;
mod webdriver;

pub use compressor::Compressor;
pub use config::{BrowserConfig, CompressionConfig, SiteLocators, StageTimeouts};
pub use error::{AutomationError, CompressionError};
pub use session::{AutomationDriver, AutomationSession, ElementHandle, SessionOptions};
pub use stages::{run_attempt, AttemptArtifact, AttemptPlan, PARTIAL_DOWNLOAD_SUFFIX};
pub use types::{CompressionOutcome, CompressionTask, Locator, Stage, TimeoutKind, TimeoutTable};
pub use webdriver::WebDriverClient;
