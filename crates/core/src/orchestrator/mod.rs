//! Task orchestrator: two bounded pools over the shared output directories.
//!
//! - **Acquisition**: one [`ItemPipeline`](crate::processor::ItemPipeline)
//!   run per descriptor, bound `min(cap, available parallelism)`
//! - **Compression**: one [`Compressor`](crate::compression::Compressor)
//!   task per file, small fixed bound since every task holds a browser
//!
//! Both stages compute the identifier set of their output directory once,
//! before submitting anything, and drop candidates already present or
//! duplicated within the run.

mod config;
mod runner;
mod types;

pub use config::AcquisitionConfig;
pub use runner::{CompressionCandidate, Orchestrator};
pub use types::{OrchestratorError, RunReport, StageReport};
