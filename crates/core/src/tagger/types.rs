//! Tag values applied to produced audio files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Fixed tag fields written to every produced file.
///
/// Unset text fields are left out. The recording year and the provenance
/// field are always written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackTags {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copyright: Option<String>,

    #[serde(default = "default_encoder")]
    pub encoder: Option<String>,

    /// Written as a locator (ID3 `WOAR`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_url: Option<String>,

    /// Front cover image. Tagging is skipped for every file when this
    /// path is not a readable image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover: Option<PathBuf>,
}

fn default_encoder() -> Option<String> {
    Some("musicdl".to_string())
}

impl Default for TrackTags {
    fn default() -> Self {
        Self {
            artist: None,
            publisher: None,
            copyright: None,
            encoder: default_encoder(),
            author_url: None,
            cover: None,
        }
    }
}

impl TrackTags {
    /// Sets the artist.
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    /// Sets the cover image path.
    pub fn with_cover(mut self, cover: PathBuf) -> Self {
        self.cover = Some(cover);
        self
    }
}

/// What a tagging call changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagOutcome {
    /// Tags were written.
    Written,
    /// File already carried every requested value.
    Unchanged,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tags = TrackTags::default();
        assert_eq!(tags.encoder.as_deref(), Some("musicdl"));
        assert!(tags.artist.is_none());
        assert!(tags.cover.is_none());
    }

    #[test]
    fn test_deserialize_partial() {
        let tags: TrackTags = toml::from_str(
            r#"
artist = "Various"
cover = "/srv/cover.png"
"#,
        )
        .unwrap();
        assert_eq!(tags.artist.as_deref(), Some("Various"));
        assert_eq!(tags.cover, Some(PathBuf::from("/srv/cover.png")));
        assert_eq!(tags.encoder.as_deref(), Some("musicdl"));
    }
}
