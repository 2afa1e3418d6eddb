//! Tagger backed by `lofty`.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Datelike, Local};
use lofty::config::WriteOptions;
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{Picture, PictureType};
use lofty::read_from_path;
use lofty::tag::{ItemKey, ItemValue, Tag, TagItem};
use tracing::debug;

use super::{TagError, TagOutcome, Tagger, TrackTags};
use crate::identity::PROVENANCE_KEY;

/// Keys replaced on every tagging pass.
const REPLACED_KEYS: &[ItemKey] = &[
    ItemKey::RecordingDate,
    ItemKey::TrackArtist,
    ItemKey::EncodedBy,
    ItemKey::Publisher,
    ItemKey::CopyrightMessage,
    ItemKey::TrackArtistUrl,
];

/// Writes tags with `lofty` on the blocking pool.
#[derive(Debug, Clone, Default)]
pub struct LoftyTagger;

impl LoftyTagger {
    pub fn new() -> Self {
        Self
    }
}

/// Reads `cover` and checks its magic bytes.
pub fn load_cover(cover: &Path) -> Result<Picture, TagError> {
    let data = std::fs::read(cover).map_err(|e| TagError::CoverUnreadable {
        path: cover.to_path_buf(),
        reason: e.to_string(),
    })?;

    if image::guess_format(&data).is_err() {
        return Err(TagError::InvalidCover {
            path: cover.to_path_buf(),
        });
    }

    let mut picture =
        Picture::from_reader(&mut Cursor::new(data)).map_err(|_| TagError::InvalidCover {
            path: cover.to_path_buf(),
        })?;
    picture.set_pic_type(PictureType::CoverFront);
    Ok(picture)
}

fn open(path: &Path) -> Result<TaggedFile, TagError> {
    read_from_path(path).map_err(|e| TagError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

fn save(tagged_file: &TaggedFile, path: &Path) -> Result<(), TagError> {
    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| TagError::Write {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Returns the primary tag, creating it when missing.
fn primary_tag_mut<'a>(tagged_file: &'a mut TaggedFile, path: &Path) -> Result<&'a mut Tag, TagError> {
    let tag_type = tagged_file.primary_tag_type();
    if tagged_file.tag(tag_type).is_none() {
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    tagged_file.tag_mut(tag_type).ok_or_else(|| TagError::Write {
        path: path.to_path_buf(),
        reason: format!("no writable tag available for {:?}", tag_type),
    })
}

fn has_provenance(tag: &Tag) -> bool {
    tag.get_string(&PROVENANCE_KEY)
        .is_some_and(|value| !value.trim().is_empty())
}

fn insert_optional(tag: &mut Tag, key: ItemKey, value: Option<&str>) {
    if let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) {
        tag.insert_text(key, value.to_string());
    }
}

fn apply_blocking(path: &Path, tags: &TrackTags) -> Result<TagOutcome, TagError> {
    // Validate the cover before touching the file.
    let cover = tags.cover.as_deref().map(load_cover).transpose()?;

    let mut tagged_file = open(path)?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let tag = primary_tag_mut(&mut tagged_file, path)?;
    for key in REPLACED_KEYS {
        tag.remove_key(&key.clone());
    }

    if !has_provenance(tag) && !stem.is_empty() {
        tag.insert_text(PROVENANCE_KEY, stem);
    }

    tag.insert_text(ItemKey::RecordingDate, Local::now().year().to_string());
    insert_optional(tag, ItemKey::TrackArtist, tags.artist.as_deref());
    insert_optional(tag, ItemKey::EncodedBy, tags.encoder.as_deref());
    insert_optional(tag, ItemKey::Publisher, tags.publisher.as_deref());
    insert_optional(tag, ItemKey::CopyrightMessage, tags.copyright.as_deref());
    if let Some(url) = tags.author_url.as_deref().filter(|u| !u.trim().is_empty()) {
        tag.insert(TagItem::new(
            ItemKey::TrackArtistUrl,
            ItemValue::Locator(url.trim().to_string()),
        ));
    }
    if let Some(picture) = cover {
        tag.remove_picture_type(PictureType::CoverFront);
        tag.push_picture(picture);
    }

    save(&tagged_file, path)?;
    debug!(path = %path.display(), "Tags written");
    Ok(TagOutcome::Written)
}

fn ensure_identity_blocking(path: &Path, identifier: &str) -> Result<TagOutcome, TagError> {
    let mut tagged_file = open(path)?;
    let tag = primary_tag_mut(&mut tagged_file, path)?;
    if has_provenance(tag) {
        return Ok(TagOutcome::Unchanged);
    }
    tag.insert_text(PROVENANCE_KEY, identifier.to_string());
    save(&tagged_file, path)?;
    Ok(TagOutcome::Written)
}

async fn run_blocking<F>(path: &Path, f: F) -> Result<TagOutcome, TagError>
where
    F: FnOnce(PathBuf) -> Result<TagOutcome, TagError> + Send + 'static,
{
    let owned = path.to_path_buf();
    tokio::task::spawn_blocking(move || f(owned))
        .await
        .map_err(|e| TagError::Write {
            path: path.to_path_buf(),
            reason: format!("tagging task failed: {}", e),
        })?
}

#[async_trait]
impl Tagger for LoftyTagger {
    async fn apply(&self, path: &Path, tags: &TrackTags) -> Result<TagOutcome, TagError> {
        let tags = tags.clone();
        run_blocking(path, move |p| apply_blocking(&p, &tags)).await
    }

    async fn ensure_identity(
        &self,
        path: &Path,
        identifier: &str,
    ) -> Result<TagOutcome, TagError> {
        let identifier = identifier.to_string();
        run_blocking(path, move |p| ensure_identity_blocking(&p, &identifier)).await
    }
}
