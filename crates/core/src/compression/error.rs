//! Error types for the compression module.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use super::types::Stage;

/// Failure of one automation attempt. Every variant is retried at session
/// granularity.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// The browser session could not be created.
    #[error("Failed to start automation session: {0}")]
    SessionStart(String),

    /// An element vanished between lookup and use.
    #[error("Element missing: {locator}")]
    ElementMissing { locator: String },

    /// A stage did not complete within its budget.
    #[error("Stage {stage} timed out after {:.1}s", timeout.as_secs_f64())]
    StageTimeout { stage: Stage, timeout: Duration },

    /// Driver protocol or transport failure.
    #[error("Driver error: {0}")]
    Driver(String),

    /// Local I/O failure in the transient download directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AutomationError {
    /// Stage the attempt stopped at, when known.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::StageTimeout { stage, .. } => Some(*stage),
            Self::SessionStart(_) => Some(Stage::SessionOpen),
            Self::ElementMissing { .. } | Self::Driver(_) | Self::Io(_) => None,
        }
    }
}

/// Terminal failure of one compression task.
#[derive(Debug, Error)]
pub enum CompressionError {
    #[error("Input is not a file: {path}")]
    InputInvalid { path: PathBuf },

    #[error("Output is not a directory: {path}")]
    OutputInvalid { path: PathBuf },

    /// Every attempt failed.
    #[error("Compression failed after {attempts} attempts: {last_error}")]
    RetryExhausted { attempts: u32, last_error: String },

    /// The artifact could not be placed into the output directory.
    #[error("Failed to copy {from} into {to}: {source}")]
    Copy {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
