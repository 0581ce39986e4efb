//! Command-line interface for the SYNOP converter
//!
//! Argument model and logging setup for the `synop` binary.

use crate::models::{RunMode, StationScheme, StationScope};

use chrono::NaiveDate;
use clap::{ArgGroup, Parser};
use std::path::PathBuf;
use tracing::debug;

/// CLI arguments for the SYNOP BUFR converter
///
/// Converts hourly BUFR files of surface observations into one CF/ACDD
/// NetCDF file per station and calendar month.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "synop",
    version,
    about = "Convert SYNOP BUFR observations to CF/ACDD NetCDF files per station",
    long_about = "Decodes hourly SYNOP BUFR files with bufr_dump, groups the reports by station \
                  identifier and writes one annotated NetCDF file per station and month. \
                  Existing monthly files are extended in place on later runs."
)]
#[command(group(
    ArgGroup::new("mode")
        .required(true)
        .args(["init", "update", "startday"])
))]
pub struct Args {
    /// YAML configuration file
    #[arg(short = 'c', long = "cfg", value_name = "FILE")]
    pub cfg: PathBuf,

    /// Station identifier scheme to convert
    #[arg(short = 't', long = "type", value_enum, value_name = "TYPE")]
    pub station_type: StationScheme,

    /// Process every input file
    #[arg(short = 'i', long = "init")]
    pub init: bool,

    /// Extend existing outputs with files newer than the last write
    #[arg(short = 'u', long = "update")]
    pub update: bool,

    /// First day to process (YYYY-MM-DD)
    #[arg(short = 's', long = "startday", value_name = "DAY", requires = "endday")]
    pub startday: Option<NaiveDate>,

    /// Last day to process, inclusive (YYYY-MM-DD)
    #[arg(short = 'e', long = "endday", value_name = "DAY", requires = "startday")]
    pub endday: Option<NaiveDate>,

    /// Convert every station found, ignoring the configured allow-list
    #[arg(short = 'a', long = "all", conflicts_with = "station")]
    pub all: bool,

    /// Convert only these station keys
    #[arg(long = "station", value_name = "ID", num_args = 1..)]
    pub station: Vec<String>,

    /// Convert into memory without writing any NetCDF file
    #[arg(long = "dry-run")]
    pub dry_run: bool,

    /// Enable debug logging
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    pub fn run_mode(&self) -> RunMode {
        match (self.startday, self.endday) {
            (Some(start), Some(end)) => RunMode::DateRange { start, end },
            _ if self.update => RunMode::Update,
            _ => RunMode::Init,
        }
    }

    /// Scope from the command line; `None` defers to the configuration
    pub fn scope(&self) -> Option<StationScope> {
        if !self.station.is_empty() {
            Some(StationScope::Only(self.station.clone()))
        } else if self.all {
            Some(StationScope::All)
        } else {
            None
        }
    }

    pub fn log_level(&self) -> &'static str {
        if self.verbose { "debug" } else { "info" }
    }
}

/// Install the stderr tracing subscriber; `RUST_LOG` overrides the level
pub fn setup_logging(level: &str) {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("synop_processor={}", level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_timer(fmt::time::uptime())
                .with_writer(std::io::stderr),
        )
        .init();

    debug!("Logging initialized at level: {}", level);
}
