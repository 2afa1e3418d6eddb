//! Mock tagger for testing.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::tagger::{TagError, TagOutcome, Tagger, TrackTags};

/// Mock implementation of the Tagger trait. Records the files it was asked
/// to tag and never touches them.
#[derive(Debug, Default)]
pub struct MockTagger {
    fail_always: AtomicBool,
    tagged: Mutex<Vec<PathBuf>>,
    identities: Mutex<Vec<(PathBuf, String)>>,
}

impl MockTagger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails every call.
    pub fn fail_always(&self) {
        self.fail_always.store(true, Ordering::SeqCst);
    }

    /// Files passed to `apply`.
    pub fn tagged_files(&self) -> Vec<PathBuf> {
        self.tagged.lock().unwrap().clone()
    }

    /// `(path, identifier)` pairs passed to `ensure_identity`.
    pub fn identities(&self) -> Vec<(PathBuf, String)> {
        self.identities.lock().unwrap().clone()
    }

    fn check(&self, path: &Path) -> Result<(), TagError> {
        if self.fail_always.load(Ordering::SeqCst) {
            return Err(TagError::Write {
                path: path.to_path_buf(),
                reason: "mock failure".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Tagger for MockTagger {
    async fn apply(&self, path: &Path, _tags: &TrackTags) -> Result<TagOutcome, TagError> {
        self.check(path)?;
        self.tagged.lock().unwrap().push(path.to_path_buf());
        Ok(TagOutcome::Written)
    }

    async fn ensure_identity(
        &self,
        path: &Path,
        identifier: &str,
    ) -> Result<TagOutcome, TagError> {
        self.check(path)?;
        self.identities
            .lock()
            .unwrap()
            .push((path.to_path_buf(), identifier.to_string()));
        Ok(TagOutcome::Written)
    }
}
