mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use sha2::{Digest, Sha256};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

use musicdl_core::{
    detect_tools, extract_names, load_config, required_tools, validate_config, write_report,
    BilibiliFavorites, Catalog, Compressor, Config, FfmpegConverter, ItemPipeline, LoftyTagger,
    Metrics, Orchestrator, OrchestratorError, PipelineConfig, RunReport, RunStages, Tagger,
    WebDriverClient, YouGetDownloader,
};

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// File name of the metrics dump inside the data directory.
const METRICS_FILE: &str = "metrics.prom";

/// Downloads a favorites list as tagged audio and keeps a compressed copy.
#[derive(Parser, Debug)]
#[command(name = "musicdl", version = VERSION)]
struct Cli {
    /// Configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch, download, convert, tag, rename and compress.
    Run {
        /// Stop after renaming.
        #[arg(long)]
        skip_compression: bool,
    },

    /// Compress the original audio directory only.
    Compress,

    /// Write a configuration file with every default.
    Init {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let result = match cli.command {
        Command::Init { force } => init(&cli.config, force),
        Command::Run { skip_compression } => {
            run(
                &cli.config,
                RunStages {
                    acquisition: true,
                    compression: !skip_compression,
                },
            )
            .await
        }
        Command::Compress => {
            run(
                &cli.config,
                RunStages {
                    acquisition: false,
                    compression: true,
                },
            )
            .await
        }
    };

    if let Err(e) = result {
        error!("Fatal error: {:#}", e);
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists, pass --force to replace it", path.display());
    }
    let rendered = musicdl_core::default_config_toml()?;
    std::fs::write(path, rendered)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

async fn run(config_path: &Path, stages: RunStages) -> Result<()> {
    let config = load_config(config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;
    let stages = RunStages {
        compression: stages.compression && config.compression.enabled,
        ..stages
    };

    let paths = &config.paths;
    for dir in paths.all() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;
    }

    let _log_guard = logging::init(&config.logging, &paths.log())?;

    let span = info_span!("run", id = %Uuid::new_v4());
    execute(&config, config_path, stages).instrument(span).await
}

async fn execute(config: &Config, config_path: &Path, stages: RunStages) -> Result<()> {
    let paths = &config.paths;

    // Short config hash to tell runs apart in the logs
    let config_json = serde_json::to_string(config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        version = VERSION,
        config = %config_path.display(),
        config_hash = &config_hash[..16],
        acquisition = stages.acquisition,
        compression = stages.compression,
        "Starting run"
    );

    let tools = detect_tools(&required_tools(config, stages)).map_err(OrchestratorError::from)?;
    info!(count = tools.len(), "External tools found");

    let metrics = Metrics::new().context("Failed to create metrics registry")?;
    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let orchestrator = Orchestrator::new(
        config.acquisition.pool_bound(),
        config.compression.workers,
    )
    .with_cancellation(cancel.clone())
    .with_metrics(metrics.clone());
    let tagger: Arc<dyn Tagger> = Arc::new(LoftyTagger::new());

    let mut report = RunReport::default();

    if stages.acquisition {
        acquire(config, &orchestrator, tagger.clone(), &metrics, &mut report).await?;
    }

    if stages.compression && !cancel.is_cancelled() {
        compress(config, &orchestrator, tagger, &metrics, &mut report).await?;
    }

    println!("{report}");
    if !report.is_success() {
        warn!("Some items failed, see the log for details");
    }

    let metrics_path = paths.data().join(METRICS_FILE);
    if let Err(e) = metrics.write_to(&metrics_path) {
        warn!(path = %metrics_path.display(), error = %e, "Failed to write metrics");
    }

    info!("Run finished");
    Ok(())
}

async fn acquire(
    config: &Config,
    orchestrator: &Orchestrator,
    tagger: Arc<dyn Tagger>,
    metrics: &Metrics,
    report: &mut RunReport,
) -> Result<()> {
    let paths = &config.paths;
    let catalog = BilibiliFavorites::new(config.catalog.clone())
        .context("Failed to create catalog client")?;

    let descriptors = match catalog.fetch().await {
        Ok(descriptors) => descriptors,
        Err(e) => {
            error!(error = %e, "Failed to fetch the favorites list");
            return Ok(());
        }
    };
    info!(items = descriptors.len(), "Favorites fetched");

    let pipeline = ItemPipeline::new(
        PipelineConfig::from_config(config, paths.original_audio()),
        Arc::new(YouGetDownloader::new(config.downloader.clone())),
        Arc::new(FfmpegConverter::new(config.converter.clone())),
        tagger,
    )
    .with_metrics(metrics.clone());

    let stage = orchestrator
        .acquire(Arc::new(pipeline), descriptors.clone())
        .await?;
    info!(%stage, "Acquisition finished");
    report.acquisition = Some(stage);

    if let Err(e) = write_report(&descriptors, &paths.data(), &config.report).await {
        warn!(error = %e, "Failed to write the report");
    }

    match extract_names(
        &paths.original_audio(),
        &config.naming.patterns,
        &config.naming.invalid_labels,
    )
    .await
    {
        Ok(outcome) => report.naming = Some(outcome),
        Err(e) => warn!(error = %e, "Name extraction failed"),
    }
    Ok(())
}

async fn compress(
    config: &Config,
    orchestrator: &Orchestrator,
    tagger: Arc<dyn Tagger>,
    metrics: &Metrics,
    report: &mut RunReport,
) -> Result<()> {
    let paths = &config.paths;
    let driver = match WebDriverClient::start(&config.compression).await {
        Ok(driver) => driver,
        Err(e) => {
            error!(error = %e, "Browser driver unavailable, skipping compression");
            return Ok(());
        }
    };

    let compressor = Compressor::new(&config.compression, Arc::new(driver), tagger)
        .with_metrics(metrics.clone());
    let stage = orchestrator
        .compress(
            Arc::new(compressor),
            &paths.original_audio(),
            &paths.compressed_audio(),
        )
        .await?;
    info!(%stage, "Compression finished");
    report.compression = Some(stage);
    Ok(())
}

/// Cancels `token` on Ctrl+C or SIGTERM.
async fn cancel_on_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    warn!("Shutdown requested, finishing started items");
    token.cancel();
}
