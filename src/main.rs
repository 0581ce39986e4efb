use anyhow::{Context, Result};
use clap::Parser;
use std::process;
use std::sync::Arc;
use synop_processor::cli::{self, Args};
use synop_processor::store::{DatasetStore, MemoryStore};
use synop_processor::{ProcessingStats, StationProcessor, SynopConfig};
use tempfile::TempDir;
use tracing::{info, warn};

fn main() {
    let args = Args::parse();
    cli::setup_logging(args.log_level());

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        let shutdown_signal = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                // without a handler the run simply cannot be interrupted
                warn!("Failed to install CTRL+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = run(args) => result,
            _ = shutdown_signal => {
                eprintln!("\nReceived CTRL+C, stopping conversion");
                Err(anyhow::anyhow!("processing interrupted by user"))
            }
        }
    });

    match result {
        // the summary has already been printed by the processor
        Ok(_stats) => process::exit(0),
        Err(error) => {
            eprintln!("Error: {:#}", error);
            process::exit(1);
        }
    }
}

#[cfg(feature = "netcdf")]
fn netcdf_store() -> Result<Arc<dyn DatasetStore>> {
    Ok(Arc::new(synop_processor::store::NetcdfStore::new()))
}

#[cfg(not(feature = "netcdf"))]
fn netcdf_store() -> Result<Arc<dyn DatasetStore>> {
    Err(synop_processor::SynopError::configuration(
        "built without NetCDF support; rebuild with --features netcdf or use --dry-run",
    )
    .into())
}

async fn run(args: Args) -> Result<ProcessingStats> {
    let mut config = SynopConfig::load(&args.cfg)
        .with_context(|| format!("Failed to load configuration from {}", args.cfg.display()))?;

    // dry runs keep datasets in memory and manifests in a scratch directory
    let scratch = if args.dry_run {
        Some(TempDir::new().context("Failed to create scratch directory for dry run")?)
    } else {
        None
    };
    let store: Arc<dyn DatasetStore> = match &scratch {
        Some(dir) => {
            info!("Dry run: nothing is written to {}", config.output.destdir.display());
            config = config.with_output_dir(dir.path());
            Arc::new(MemoryStore::new())
        }
        None => netcdf_store()?,
    };

    let mut processor = StationProcessor::new(config, args.station_type, args.run_mode(), store)?;
    if let Some(scope) = args.scope() {
        processor = processor.with_scope(scope);
    }

    let stats = processor.process().await?;
    Ok(stats)
}
