//! Types for the orchestrator.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::naming::NamingOutcome;
use crate::pool::AggregateResult;
use crate::tools::ToolError;

/// Errors fatal to a whole run. Detected before any pool starts.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A required directory is missing or not a directory.
    #[error("Invalid path {path}: {reason}")]
    PathInvalid { path: PathBuf, reason: String },

    /// A required external tool is missing.
    #[error(transparent)]
    ToolUnavailable(#[from] ToolError),
}

/// Summary of one pool stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub result: AggregateResult,
    /// Candidates already represented in the output directory.
    pub already_present: usize,
    /// Candidates dropped because an earlier candidate had the same identity.
    pub duplicates: usize,
}

impl StageReport {
    pub fn new(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            ..Default::default()
        }
    }
}

impl fmt::Display for StageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (already present {}, duplicates {})",
            self.stage, self.result, self.already_present, self.duplicates
        )
    }
}

/// Per-stage summary of a whole run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub acquisition: Option<StageReport>,
    pub naming: Option<NamingOutcome>,
    pub compression: Option<StageReport>,
}

impl RunReport {
    /// True when no started item failed in any stage.
    pub fn is_success(&self) -> bool {
        [&self.acquisition, &self.compression]
            .into_iter()
            .flatten()
            .all(|stage| stage.result.is_success())
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(stage) = &self.acquisition {
            writeln!(f, "{stage}")?;
        }
        if let Some(naming) = &self.naming {
            writeln!(f, "naming: {naming}")?;
        }
        if let Some(stage) = &self.compression {
            writeln!(f, "{stage}")?;
        }
        Ok(())
    }
}
