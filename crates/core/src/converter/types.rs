//! Types for the converter module.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Audio format specification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudioFormat {
    /// Free Lossless Audio Codec (lossless)
    Flac,
    /// MPEG Audio Layer III
    #[default]
    Mp3,
    /// Advanced Audio Coding
    Aac,
    /// Ogg Vorbis
    OggVorbis,
    /// Opus (modern, efficient)
    Opus,
    /// WAVE (uncompressed)
    Wav,
}

impl AudioFormat {
    /// Returns the file extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Aac => "m4a",
            Self::OggVorbis => "ogg",
            Self::Opus => "opus",
            Self::Wav => "wav",
        }
    }

    /// Returns the ffmpeg codec name for this format.
    pub fn ffmpeg_codec(&self) -> &'static str {
        match self {
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Aac => "aac",
            Self::OggVorbis => "libvorbis",
            Self::Opus => "libopus",
            Self::Wav => "pcm_s16le",
        }
    }

    /// Whether this format is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, Self::Flac | Self::Wav)
    }

    /// Output path for `source` converted into `output_dir`.
    ///
    /// The output keeps the source stem, so names stay unique per item.
    pub fn output_path(&self, source: &Path, output_dir: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        output_dir.join(format!("{}.{}", stem, self.extension()))
    }
}

/// A single audio extraction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionJob {
    /// Downloaded media file.
    pub input_path: PathBuf,
    /// Destination audio file.
    pub output_path: PathBuf,
    pub format: AudioFormat,
    /// Number of audio channels (1 = mono, 2 = stereo).
    pub channels: u8,
    /// Target bitrate in kbps (lossy formats only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate_kbps: Option<u32>,
}

impl ConversionJob {
    /// Stereo extraction of `input_path` into `output_dir`.
    pub fn new(input_path: PathBuf, output_dir: &Path, format: AudioFormat) -> Self {
        let output_path = format.output_path(&input_path, output_dir);
        Self {
            input_path,
            output_path,
            format,
            channels: 2,
            bitrate_kbps: None,
        }
    }
}

/// Result of a successful conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub output_path: PathBuf,
    pub output_size_bytes: u64,
    /// Time taken in milliseconds.
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_format_extension() {
        assert_eq!(AudioFormat::Flac.extension(), "flac");
        assert_eq!(AudioFormat::Mp3.extension(), "mp3");
        assert_eq!(AudioFormat::Aac.extension(), "m4a");
        assert_eq!(AudioFormat::OggVorbis.extension(), "ogg");
    }

    #[test]
    fn test_audio_format_lossless() {
        assert!(AudioFormat::Flac.is_lossless());
        assert!(AudioFormat::Wav.is_lossless());
        assert!(!AudioFormat::Mp3.is_lossless());
    }

    #[test]
    fn test_default_format_is_mp3() {
        assert_eq!(AudioFormat::default(), AudioFormat::Mp3);
    }

    #[test]
    fn test_output_path_keeps_stem() {
        let path = AudioFormat::Mp3.output_path(Path::new("/scratch/My Song.flv"), Path::new("/out"));
        assert_eq!(path, PathBuf::from("/out/My Song.mp3"));
    }

    #[test]
    fn test_audio_format_serialization() {
        let json = serde_json::to_string(&AudioFormat::OggVorbis).unwrap();
        assert_eq!(json, "\"ogg_vorbis\"");
    }
}
