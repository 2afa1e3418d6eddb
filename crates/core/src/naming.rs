//! Post-acquisition renaming from bracketed parts of file names.
//!
//! `《Song》【Live】 (2019).mp3` becomes `song - live - 2019.mp3` with the
//! default patterns. Only the name changes; the provenance tag written at
//! acquisition time stays, so the file keeps its identity.

use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::identity::list_files;

/// Separator between extracted parts.
const JOINER: &str = " - ";

#[derive(Debug, Error)]
pub enum NamingError {
    #[error("Invalid matching pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Failed to list {path}: {source}")]
    List {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingConfig {
    /// Patterns whose first capture group is extracted.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,

    /// Captures dropped from the new name. Compared case-insensitively.
    #[serde(default = "default_invalid_labels")]
    pub invalid_labels: Vec<String>,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            patterns: default_patterns(),
            invalid_labels: default_invalid_labels(),
        }
    }
}

fn default_patterns() -> Vec<String> {
    [r"《(.*?)》", r"【(.*?)】", r"\((.*?)\)", r"\[(.*?)\]"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_invalid_labels() -> Vec<String> {
    [
        "伴奏",
        "音质",
        "歌词版",
        "完整版",
        "phonk",
        "4k60帧",
        "4k高码率",
        "hi-res",
        "音乐推荐",
        "动态歌词",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// Counts of one renaming pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamingOutcome {
    pub renamed: usize,
    pub failed: usize,
    pub unmatched: usize,
}

impl fmt::Display for NamingOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "renamed={} failed={} unmatched={}",
            self.renamed, self.failed, self.unmatched
        )
    }
}

/// Compiles every pattern, reporting the first invalid one.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>, NamingError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| NamingError::Pattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// New file name for `file_name`, or `None` when nothing usable matched.
fn extracted_name(file_name: &str, patterns: &[Regex], invalid_labels: &[String]) -> Option<String> {
    let normalized = file_name.trim().to_lowercase();
    let mut parts: Vec<&str> = Vec::new();

    for pattern in patterns {
        for caps in pattern.captures_iter(&normalized) {
            let Some(part) = caps.get(1).or_else(|| caps.get(0)) else {
                continue;
            };
            let part = part.as_str();
            if part.is_empty() || invalid_labels.iter().any(|l| l.to_lowercase() == part) {
                continue;
            }
            parts.push(part);
        }
    }

    if parts.is_empty() {
        return None;
    }

    let extension = Path::new(file_name)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    Some(format!("{}{}", parts.join(JOINER), extension))
}

/// Renames every file of `dir` to the parts extracted by `patterns`.
///
/// Files without a usable match are left alone. A rename whose target
/// already exists is skipped and counted as failed.
pub async fn extract_names(
    dir: &Path,
    patterns: &[String],
    invalid_labels: &[String],
) -> Result<NamingOutcome, NamingError> {
    let compiled = compile_patterns(patterns)?;
    let files = list_files(dir).await.map_err(|source| NamingError::List {
        path: dir.display().to_string(),
        source,
    })?;

    let mut outcome = NamingOutcome::default();
    for path in files {
        let Some(file_name) = path.file_name().map(|n| n.to_string_lossy().into_owned()) else {
            continue;
        };
        let Some(new_name) = extracted_name(&file_name, &compiled, invalid_labels) else {
            debug!(file = %file_name, "No usable match");
            outcome.unmatched += 1;
            continue;
        };

        let target = dir.join(&new_name);
        if tokio::fs::metadata(&target).await.is_ok() {
            warn!(file = %file_name, target = %new_name, "Rename target already exists");
            outcome.failed += 1;
            continue;
        }

        match tokio::fs::rename(&path, &target).await {
            Ok(()) => {
                info!(file = %file_name, target = %new_name, "Renamed");
                outcome.renamed += 1;
            }
            Err(e) => {
                warn!(file = %file_name, target = %new_name, error = %e, "Rename failed");
                outcome.failed += 1;
            }
        }
    }

    info!(%outcome, "Name extraction finished");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn defaults() -> (Vec<Regex>, Vec<String>) {
        let config = NamingConfig::default();
        (compile_patterns(&config.patterns).unwrap(), config.invalid_labels)
    }

    #[test]
    fn test_extracts_parts_in_pattern_order() {
        let (patterns, labels) = defaults();
        assert_eq!(
            extracted_name("【Live】《Song Title》 (2019).mp3", &patterns, &labels).as_deref(),
            Some("song title - live - 2019.mp3")
        );
    }

    #[test]
    fn test_invalid_labels_and_empty_captures_are_dropped() {
        let (patterns, labels) = defaults();
        assert_eq!(
            extracted_name("《夜曲》【动态歌词】[PHONK]().flac", &patterns, &labels).as_deref(),
            Some("夜曲.flac")
        );
        assert_eq!(extracted_name("【伴奏】plain.mp3", &patterns, &labels), None);
    }

    #[test]
    fn test_name_without_brackets_is_unmatched() {
        let (patterns, labels) = defaults();
        assert_eq!(extracted_name("plain song.mp3", &patterns, &labels), None);
    }

    #[test]
    fn test_invalid_pattern_is_reported() {
        let result = compile_patterns(&["(unclosed".to_string()]);
        assert!(matches!(result, Err(NamingError::Pattern { .. })));
    }

    #[tokio::test]
    async fn test_extract_names_renames_and_counts() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("《A》.mp3"), b"a").unwrap();
        std::fs::write(dir.path().join("【b】 x.mp3"), b"b").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"existing").unwrap();
        std::fs::write(dir.path().join("plain.mp3"), b"c").unwrap();

        let config = NamingConfig::default();
        let outcome = extract_names(dir.path(), &config.patterns, &config.invalid_labels)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            NamingOutcome {
                renamed: 1,
                failed: 1,
                unmatched: 2,
            }
        );
        assert_eq!(std::fs::read(dir.path().join("a.mp3")).unwrap(), b"a");
        assert_eq!(std::fs::read(dir.path().join("b.mp3")).unwrap(), b"existing");
        assert!(dir.path().join("【b】 x.mp3").exists());
    }
}
