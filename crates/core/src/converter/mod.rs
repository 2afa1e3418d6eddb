//! Converter module for extracting audio from downloaded media.
//!
//! This module provides the `Converter` trait and an FFmpeg implementation
//! that strips video streams and re-encodes the audio track.
//!
//! # Example
//!
//! ```ignore
//! use musicdl_core::converter::{AudioFormat, ConversionJob, Converter, ConverterConfig, FfmpegConverter};
//!
//! let converter = FfmpegConverter::new(ConverterConfig::default());
//! converter.validate().await?;
//!
//! let job = ConversionJob::new(PathBuf::from("/scratch/BV1xx.flv"), Path::new("/music"), AudioFormat::Mp3);
//! let result = converter.convert(&job).await?;
//! println!("Wrote {} in {} ms", result.output_path.display(), result.duration_ms);
//! ```

mod config;
mod error;
mod ffmpeg;
mod traits;
mod types;

pub use config::ConverterConfig;
pub use error::ConverterError;
pub use ffmpeg::FfmpegConverter;
pub use traits::Converter;
pub use types::{AudioFormat, ConversionJob, ConversionResult};
