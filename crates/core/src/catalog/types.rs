//! Media descriptors supplied by the catalog.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Characters that cannot appear in a file name on common filesystems.
pub const FORBIDDEN_FILENAME_CHARS: &[char] = &['\\', '/', ':', '*', '?', '"', '<', '>', '|'];

/// Placeholder for entries that carry no title.
pub const UNKNOWN_TITLE: &str = "Unknown title";

/// Engagement counters of a media item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStats {
    pub play: u64,
    pub coin: u64,
    pub reply: u64,
    pub share: u64,
    pub danmaku: u64,
    pub collect: u64,
    pub thumb_up: u64,
}

/// One item of the favorites list, validated at the catalog boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaDescriptor {
    /// Catalog identifier (a `BV...` video id).
    pub id: String,
    /// Title with forbidden file name characters removed.
    pub title: String,
    pub duration_secs: u64,
    pub published_at: Option<DateTime<Utc>>,
    pub cover_url: Option<String>,
    pub stats: MediaStats,
}

impl MediaDescriptor {
    /// Creates a descriptor with empty stats.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: sanitize_title(&title.into()),
            duration_secs: 0,
            published_at: None,
            cover_url: None,
            stats: MediaStats::default(),
        }
    }

    /// Duration as `HH:MM:SS`.
    pub fn duration_display(&self) -> String {
        let secs = self.duration_secs;
        format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
    }

    /// Publish time as `YYYY-MM-DD HH:MM:SS`, or `unknown`.
    pub fn published_display(&self) -> String {
        self.published_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

/// Strips forbidden file name characters and surrounding whitespace.
///
/// Returns [`UNKNOWN_TITLE`] when nothing remains.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN_FILENAME_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        UNKNOWN_TITLE.to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_title_strips_forbidden_chars() {
        assert_eq!(sanitize_title(r#"a/b\c:d*e?f"g<h>i|j"#), "abcdefghij");
        assert_eq!(sanitize_title("  【MV】 Song  "), "【MV】 Song");
    }

    #[test]
    fn test_sanitize_title_empty_falls_back() {
        assert_eq!(sanitize_title("///"), UNKNOWN_TITLE);
        assert_eq!(sanitize_title(""), UNKNOWN_TITLE);
    }

    #[test]
    fn test_duration_display() {
        let mut descriptor = MediaDescriptor::new("BV1", "x");
        descriptor.duration_secs = 3725;
        assert_eq!(descriptor.duration_display(), "01:02:05");
    }

    #[test]
    fn test_published_display() {
        let mut descriptor = MediaDescriptor::new("BV1", "x");
        assert_eq!(descriptor.published_display(), "unknown");
        descriptor.published_at = DateTime::from_timestamp(0, 0);
        assert_eq!(descriptor.published_display(), "1970-01-01 00:00:00");
    }
}
