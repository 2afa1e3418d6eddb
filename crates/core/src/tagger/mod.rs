//! Tagging module: writes fixed metadata and the provenance field.
//!
//! Tag failures never abort a pipeline; callers log them and move on.

mod lofty_tagger;
mod types;

pub use lofty_tagger::LoftyTagger;
pub use types::{TagOutcome, TrackTags};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while tagging a file.
#[derive(Debug, Error)]
pub enum TagError {
    /// Audio file could not be parsed.
    #[error("Failed to read tags of {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    /// Tags could not be saved.
    #[error("Failed to write tags of {path}: {reason}")]
    Write { path: PathBuf, reason: String },

    /// Cover file is not an image.
    #[error("Cover is not a valid image: {path}")]
    InvalidCover { path: PathBuf },

    /// Cover file could not be read.
    #[error("Cover is unreadable: {path}: {reason}")]
    CoverUnreadable { path: PathBuf, reason: String },
}

/// Writes metadata into produced audio files.
#[async_trait]
pub trait Tagger: Send + Sync {
    /// Applies `tags` to `path`.
    ///
    /// The provenance field is set to the file stem only when absent. An
    /// invalid or unreadable cover aborts tagging for this file before it
    /// is modified.
    async fn apply(&self, path: &Path, tags: &TrackTags) -> Result<TagOutcome, TagError>;

    /// Writes `identifier` into the provenance field unless one is present.
    async fn ensure_identity(&self, path: &Path, identifier: &str)
        -> Result<TagOutcome, TagError>;
}
