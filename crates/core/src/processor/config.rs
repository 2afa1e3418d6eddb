//! Configuration for the per-item pipeline.

use std::path::PathBuf;
use std::time::Duration;

use crate::backoff::BackoffPolicy;
use crate::config::Config;
use crate::converter::AudioFormat;
use crate::tagger::TrackTags;

/// Settings of one acquisition pipeline.
///
/// Assembled from the downloader, converter and tagging sections.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Shared output directory.
    pub output_dir: PathBuf,

    /// Parent of the per-item scratch directories.
    pub scratch_root: PathBuf,

    /// Initial download timeout; escalates after every failed attempt.
    pub download_timeout: Duration,

    pub download_max_retries: u32,

    pub download_backoff: BackoffPolicy,

    pub audio_format: AudioFormat,

    pub channels: u8,

    pub bitrate_kbps: Option<u32>,

    pub conversion_max_retries: u32,

    pub conversion_backoff: BackoffPolicy,

    pub tags: TrackTags,
}

impl PipelineConfig {
    /// Pipeline writing into `output_dir` with default settings.
    pub fn new(output_dir: PathBuf) -> Self {
        Self::from_config(&Config::default(), output_dir)
    }

    /// Builds the pipeline settings from the loaded configuration.
    pub fn from_config(config: &Config, output_dir: PathBuf) -> Self {
        Self {
            output_dir,
            scratch_root: std::env::temp_dir(),
            download_timeout: Duration::from_secs(config.downloader.timeout_secs),
            download_max_retries: config.downloader.max_retries,
            download_backoff: config.downloader.backoff,
            audio_format: config.converter.audio_format,
            channels: config.converter.channels,
            bitrate_kbps: config.converter.bitrate_kbps,
            conversion_max_retries: config.converter.max_retries,
            conversion_backoff: config.converter.backoff,
            tags: config.tagging.clone(),
        }
    }

    /// Sets the scratch parent directory.
    pub fn with_scratch_root(mut self, scratch_root: PathBuf) -> Self {
        self.scratch_root = scratch_root;
        self
    }

    /// Sets both retry bounds.
    pub fn with_max_retries(mut self, download: u32, conversion: u32) -> Self {
        self.download_max_retries = download;
        self.conversion_max_retries = conversion;
        self
    }

    /// Uses `backoff` for both retry loops.
    pub fn with_backoff(mut self, backoff: BackoffPolicy) -> Self {
        self.download_backoff = backoff;
        self.conversion_backoff = backoff;
        self
    }

    pub fn with_tags(mut self, tags: TrackTags) -> Self {
        self.tags = tags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config() {
        let mut config = Config::default();
        config.downloader.timeout_secs = 90;
        config.converter.audio_format = AudioFormat::Opus;

        let pipeline = PipelineConfig::from_config(&config, PathBuf::from("/music"));

        assert_eq!(pipeline.output_dir, PathBuf::from("/music"));
        assert_eq!(pipeline.download_timeout, Duration::from_secs(90));
        assert_eq!(pipeline.download_max_retries, 2);
        assert_eq!(pipeline.conversion_max_retries, 3);
        assert_eq!(pipeline.audio_format, AudioFormat::Opus);
    }

    #[test]
    fn test_builder() {
        let pipeline = PipelineConfig::new(PathBuf::from("/out"))
            .with_scratch_root(PathBuf::from("/scratch"))
            .with_max_retries(4, 1)
            .with_backoff(BackoffPolicy::new(1.0, 0.0, 1.0, 1.0));

        assert_eq!(pipeline.scratch_root, PathBuf::from("/scratch"));
        assert_eq!(pipeline.download_max_retries, 4);
        assert_eq!(pipeline.conversion_max_retries, 1);
        assert_eq!(pipeline.download_backoff.max_wait_secs, 0.0);
    }
}
