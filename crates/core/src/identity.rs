//! Content identity used to deduplicate output files.
//!
//! A file's identifier is the provenance text stored in its track subtitle
//! tag (ID3 `TIT3`) when present, otherwise its byte length. The size
//! fallback can make two different files look identical; that is accepted as
//! a conservative false positive (a file may be skipped, never processed
//! twice).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use futures::stream::{self, StreamExt};
use lofty::file::TaggedFileExt;
use lofty::read_from_path;
use lofty::tag::ItemKey;
use tracing::{debug, warn};

/// Tag item holding the provenance text.
pub const PROVENANCE_KEY: ItemKey = ItemKey::TrackSubtitle;

/// Maximum files resolved concurrently by [`existing_identifiers`].
const RESOLVE_CONCURRENCY: usize = 8;

/// Reads the provenance text embedded in `path`, if any.
pub fn read_provenance(path: &Path) -> Result<Option<String>, lofty::error::LoftyError> {
    let tagged_file = read_from_path(path)?;
    let value = tagged_file
        .primary_tag()
        .and_then(|tag| tag.get_string(&PROVENANCE_KEY))
        .or_else(|| {
            tagged_file
                .tags()
                .iter()
                .find_map(|tag| tag.get_string(&PROVENANCE_KEY))
        })
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string);
    Ok(value)
}

/// Synchronous core of [`identifier`].
///
/// Never fails. Unreadable tags fall back to the byte size; an unreadable
/// file falls back to an empty size marker.
pub fn identifier_blocking(path: &Path) -> String {
    match read_provenance(path) {
        Ok(Some(value)) => return value,
        Ok(None) => debug!(path = %path.display(), "No provenance tag, using file size"),
        Err(e) => warn!(
            path = %path.display(),
            error = %e,
            "Failed to read tags, using file size"
        ),
    }

    match std::fs::metadata(path) {
        Ok(meta) => meta.len().to_string(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to stat file");
            String::from("0")
        }
    }
}

/// Derives the identifier of `path`.
pub async fn identifier(path: &Path) -> String {
    let owned = path.to_path_buf();
    match tokio::task::spawn_blocking(move || identifier_blocking(&owned)).await {
        Ok(id) => id,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Identifier task failed");
            tokio::fs::metadata(path)
                .await
                .map(|meta| meta.len().to_string())
                .unwrap_or_else(|_| String::from("0"))
        }
    }
}

/// Lists the regular files directly inside `dir`, skipping hidden entries.
pub async fn list_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if hidden {
            continue;
        }
        match entry.file_type().await {
            Ok(ft) if ft.is_file() => files.push(entry.path()),
            Ok(_) => {}
            Err(e) => warn!(path = %entry.path().display(), error = %e, "Failed to stat entry"),
        }
    }

    files.sort();
    Ok(files)
}

/// Computes the identifiers of every file in `dir`.
///
/// Each file is resolved independently; the result does not depend on
/// listing order. A missing or unreadable directory yields an empty set.
pub async fn existing_identifiers(dir: &Path) -> HashSet<String> {
    let files = match list_files(dir).await {
        Ok(files) => files,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to list directory");
            return HashSet::new();
        }
    };

    let ids: HashSet<String> = stream::iter(files)
        .map(|path| async move { identifier(&path).await })
        .buffer_unordered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    debug!(dir = %dir.display(), count = ids.len(), "Resolved existing identifiers");
    ids
}
