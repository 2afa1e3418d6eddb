//! Processor module: the per-item acquisition pipeline.
//!
//! [`ItemPipeline`] turns one [`MediaDescriptor`](crate::catalog::MediaDescriptor)
//! into a tagged audio file:
//! - Download into a private scratch directory, retried with escalating timeouts
//! - Convert into the output directory, retried with a fixed pause
//! - Tag the produced file (failures are logged, never fatal)
//!
//! # Example
//!
//! ```ignore
//! use musicdl_core::processor::{ItemPipeline, PipelineConfig};
//!
//! let pipeline = ItemPipeline::new(
//!     PipelineConfig::from_config(&config, config.paths.original_audio()),
//!     downloader,
//!     converter,
//!     tagger,
//! );
//! let outcome = pipeline.run(&descriptor).await?;
//! println!("Wrote {}", outcome.output_path.display());
//! ```

mod config;
mod pipeline;
mod types;

pub use config::PipelineConfig;
pub use pipeline::{ItemPipeline, PipelineError};
pub use types::{PipelineOutcome, PipelineTask};
