//! Types for the processor module.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::catalog::MediaDescriptor;

/// One acquisition in progress.
///
/// The scratch directory belongs to this task alone and is removed when
/// the task ends, whatever the outcome.
#[derive(Debug, Clone)]
pub struct PipelineTask {
    pub descriptor: MediaDescriptor,
    pub output_dir: PathBuf,
    pub scratch_dir: PathBuf,
}

/// Result of a successful pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineOutcome {
    /// Produced audio file.
    pub output_path: PathBuf,
    pub download_attempts: u32,
    pub conversion_attempts: u32,
    /// Whether tags were written. Tagging failures do not fail the item.
    pub tagged: bool,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_serialization() {
        let outcome = PipelineOutcome {
            output_path: PathBuf::from("/music/Song.mp3"),
            download_attempts: 2,
            conversion_attempts: 1,
            tagged: true,
            duration_ms: 1500,
        };

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"download_attempts\":2"));
        assert!(json.contains("\"tagged\":true"));
    }
}
