//! Types for the compression module.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::{BackoffPolicy, Escalate};

/// Timeout budget a stage draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutKind {
    Load,
    Compress,
    Completion,
}

/// Per-task timeout table. Escalated as a whole after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutTable {
    pub load: Duration,
    pub compress: Duration,
    pub completion: Duration,
}

impl TimeoutTable {
    pub fn from_secs(load: u64, compress: u64, completion: u64) -> Self {
        Self {
            load: Duration::from_secs(load),
            compress: Duration::from_secs(compress),
            completion: Duration::from_secs(completion),
        }
    }

    /// Same budget for every stage.
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            load: timeout,
            compress: timeout,
            completion: timeout,
        }
    }

    pub fn get(&self, kind: TimeoutKind) -> Duration {
        match kind {
            TimeoutKind::Load => self.load,
            TimeoutKind::Compress => self.compress,
            TimeoutKind::Completion => self.completion,
        }
    }
}

impl Escalate for TimeoutTable {
    fn escalate(&mut self, policy: &BackoffPolicy) {
        self.load = policy.escalate(self.load);
        self.compress = policy.escalate(self.compress);
        self.completion = policy.escalate(self.completion);
    }
}

/// States of one automation attempt, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Init,
    SessionOpen,
    NavigateTarget,
    UploadSubmitted,
    AwaitResult,
    LocateDownloadLink,
    AwaitDownloadStart,
    AwaitDownloadComplete,
    Finalize,
}

impl Stage {
    pub const ALL: [Stage; 9] = [
        Stage::Init,
        Stage::SessionOpen,
        Stage::NavigateTarget,
        Stage::UploadSubmitted,
        Stage::AwaitResult,
        Stage::LocateDownloadLink,
        Stage::AwaitDownloadStart,
        Stage::AwaitDownloadComplete,
        Stage::Finalize,
    ];

    /// Successor on the happy path.
    pub fn next(self) -> Option<Stage> {
        let index = Self::ALL.iter().position(|s| *s == self)?;
        Self::ALL.get(index + 1).copied()
    }

    /// Budget guarding the transition out of this stage.
    pub fn timeout_kind(self) -> TimeoutKind {
        match self {
            Stage::AwaitResult | Stage::AwaitDownloadStart => TimeoutKind::Compress,
            Stage::AwaitDownloadComplete => TimeoutKind::Completion,
            _ => TimeoutKind::Load,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Init => "init",
            Stage::SessionOpen => "session_open",
            Stage::NavigateTarget => "navigate_target",
            Stage::UploadSubmitted => "upload_submitted",
            Stage::AwaitResult => "await_result",
            Stage::LocateDownloadLink => "locate_download_link",
            Stage::AwaitDownloadStart => "await_download_start",
            Stage::AwaitDownloadComplete => "await_download_complete",
            Stage::Finalize => "finalize",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an element is looked up on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locator {
    Css(String),
    Xpath(String),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self::Css(selector.into())
    }

    pub fn xpath(expression: impl Into<String>) -> Self {
        Self::Xpath(expression.into())
    }

    /// W3C `using` strategy.
    pub fn strategy(&self) -> &'static str {
        match self {
            Self::Css(_) => "css selector",
            Self::Xpath(_) => "xpath",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            Self::Css(v) | Self::Xpath(v) => v,
        }
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.strategy(), self.value())
    }
}

/// One file to compress.
///
/// The timeout table starts from the configured defaults and belongs to
/// this task's attempts only.
#[derive(Debug, Clone)]
pub struct CompressionTask {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Identifier of the input, written into the output as completion marker.
    pub identifier: String,
    pub timeouts: TimeoutTable,
}

/// Result of a successful compression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionOutcome {
    pub output_path: PathBuf,
    pub attempts: u32,
    /// Whether the completion marker is confirmed on the output.
    pub marked: bool,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order() {
        let mut stage = Stage::Init;
        let mut visited = vec![stage];
        while let Some(next) = stage.next() {
            visited.push(next);
            stage = next;
        }
        assert_eq!(visited, Stage::ALL.to_vec());
        assert_eq!(Stage::Finalize.next(), None);
    }

    #[test]
    fn test_stage_budgets() {
        assert_eq!(Stage::NavigateTarget.timeout_kind(), TimeoutKind::Load);
        assert_eq!(Stage::AwaitResult.timeout_kind(), TimeoutKind::Compress);
        assert_eq!(
            Stage::AwaitDownloadComplete.timeout_kind(),
            TimeoutKind::Completion
        );
    }

    #[test]
    fn test_timeout_table_escalates_together() {
        let policy = BackoffPolicy::compression_defaults();
        let mut table = TimeoutTable::from_secs(5, 20, 200);
        table.escalate(&policy);
        assert_eq!(table, TimeoutTable::from_secs(10, 40, 300));
    }

    #[test]
    fn test_locator_strategy() {
        assert_eq!(Locator::css("#a").strategy(), "css selector");
        assert_eq!(Locator::xpath("//a").to_string(), "xpath=//a");
    }
}
