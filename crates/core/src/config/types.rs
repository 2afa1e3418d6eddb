use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::CatalogConfig;
use crate::compression::CompressionConfig;
use crate::converter::ConverterConfig;
use crate::downloader::DownloaderConfig;
use crate::naming::NamingConfig;
use crate::orchestrator::AcquisitionConfig;
use crate::report::ReportConfig;
use crate::tagger::TrackTags;
use crate::tools::ToolsConfig;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub downloader: DownloaderConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    #[serde(default)]
    pub tagging: TrackTags,
    #[serde(default)]
    pub acquisition: AcquisitionConfig,
    #[serde(default)]
    pub compression: CompressionConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Directory layout of a run.
///
/// Every directory lives under `<root>/<app_dir>`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PathsConfig {
    #[serde(default = "default_root")]
    pub root: PathBuf,
    #[serde(default = "default_app_dir")]
    pub app_dir: String,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Tagged downloads, input of the compression stage.
    #[serde(default = "default_original_audio_dir")]
    pub original_audio_dir: PathBuf,
    /// Compressed copies.
    #[serde(default = "default_compressed_audio_dir")]
    pub compressed_audio_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            app_dir: default_app_dir(),
            log_dir: default_log_dir(),
            data_dir: default_data_dir(),
            original_audio_dir: default_original_audio_dir(),
            compressed_audio_dir: default_compressed_audio_dir(),
        }
    }
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_app_dir() -> String {
    "MusicDownloader".to_string()
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("Log")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("Data")
}

fn default_original_audio_dir() -> PathBuf {
    Path::new("Music").join("OriginalAudio")
}

fn default_compressed_audio_dir() -> PathBuf {
    Path::new("Music").join("CompressedAudio")
}

impl PathsConfig {
    /// Base directory holding every other directory.
    pub fn base(&self) -> PathBuf {
        self.root.join(&self.app_dir)
    }

    pub fn log(&self) -> PathBuf {
        self.base().join(&self.log_dir)
    }

    pub fn data(&self) -> PathBuf {
        self.base().join(&self.data_dir)
    }

    pub fn original_audio(&self) -> PathBuf {
        self.base().join(&self.original_audio_dir)
    }

    pub fn compressed_audio(&self) -> PathBuf {
        self.base().join(&self.compressed_audio_dir)
    }

    /// All directories a run writes to.
    pub fn all(&self) -> [PathBuf; 4] {
        [
            self.log(),
            self.data(),
            self.original_audio(),
            self.compressed_audio(),
        ]
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines on the terminal.
    #[serde(default)]
    pub json: bool,
    /// Also write a daily rolling log file under the log directory.
    #[serde(default = "default_true")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            file: true,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::AudioFormat;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.paths.app_dir, "MusicDownloader");
        assert_eq!(config.acquisition.max_workers, 10);
        assert_eq!(config.compression.workers, 3);
        assert_eq!(config.converter.audio_format, AudioFormat::Mp3);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file);
    }

    #[test]
    fn test_deserialize_partial_sections() {
        let toml = r#"
[paths]
root = "/srv/music"

[catalog]
favorites_id = "3104892245"
page_size = 50

[compression]
enabled = false
workers = 2
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.paths.root, PathBuf::from("/srv/music"));
        assert_eq!(config.catalog.favorites_id, "3104892245");
        assert_eq!(config.catalog.page_size, 50);
        assert!(!config.compression.enabled);
        assert_eq!(config.compression.workers, 2);
        assert_eq!(config.compression.max_retries, 3);
    }

    #[test]
    fn test_paths_layout() {
        let paths = PathsConfig {
            root: PathBuf::from("/data"),
            ..Default::default()
        };
        assert_eq!(paths.base(), PathBuf::from("/data/MusicDownloader"));
        assert_eq!(paths.log(), PathBuf::from("/data/MusicDownloader/Log"));
        assert_eq!(
            paths.compressed_audio(),
            PathBuf::from("/data/MusicDownloader/Music/CompressedAudio")
        );
    }
}
