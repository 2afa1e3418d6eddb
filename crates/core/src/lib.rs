pub mod backoff;
pub mod catalog;
pub mod compression;
pub mod config;
pub mod converter;
pub mod downloader;
pub mod identity;
pub mod metrics;
pub mod naming;
pub mod orchestrator;
pub mod pool;
pub mod processor;
pub mod report;
pub mod tagger;
pub mod testing;
pub mod tools;

pub use backoff::{BackoffPolicy, Escalate, RetryState};
pub use catalog::{BilibiliFavorites, Catalog, CatalogError, MediaDescriptor};
pub use compression::{
    AutomationDriver, AutomationError, CompressionConfig, CompressionError, Compressor,
    WebDriverClient,
};
pub use config::{
    default_config_toml, load_config, load_config_from_str, validate_config, Config, ConfigError,
};
pub use converter::{Converter, FfmpegConverter};
pub use downloader::{Downloader, YouGetDownloader};
pub use metrics::Metrics;
pub use naming::{extract_names, NamingOutcome};
pub use orchestrator::{Orchestrator, OrchestratorError, RunReport, StageReport};
pub use pool::{AggregateResult, WorkerPool};
pub use processor::{ItemPipeline, PipelineConfig};
pub use report::write_report;
pub use tagger::{LoftyTagger, Tagger};
pub use tools::{detect_tools, required_tools, RunStages, ToolError};
