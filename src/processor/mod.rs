//! Main processing engine.
//!
//! Orchestrates a conversion run: input discovery and mode selection,
//! concurrent decoding and station routing, then per-station assembly,
//! annotation and monthly persistence.

pub mod discovery;
pub mod streaming;
pub mod writer;

#[cfg(test)]
pub mod tests;

use self::{
    discovery::{FileDiscovery, select_files},
    streaming::StreamingDecoder,
    writer::{PersistOutcome, RolloverManager},
};

use crate::bufr::BufrDumper;
use crate::config::SynopConfig;
use crate::error::{Result, SynopError};
use crate::metadata::DatasetAnnotator;
use crate::metadata::standard_names::{CfStandardNameTable, StandardNameLookup};
use crate::models::{ProcessingStats, RunMode, Skip, StationScheme, StationScope, Subset};
use crate::station::StationRouter;
use crate::store::{DatasetStore, manifest};
use crate::table::assemble;

use chrono::{DateTime, Utc};
use colored::*;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tokio::task;
use tracing::{debug, warn};

/// Result of converting one station
#[derive(Debug)]
struct StationOutcome {
    persisted: PersistOutcome,
    skipped: Vec<Skip>,
}

fn convert_station(
    station: &str,
    subsets: &[Subset],
    annotator: &DatasetAnnotator,
    rollover: &RolloverManager,
) -> Result<StationOutcome> {
    let table = assemble(station, subsets)?;
    let skipped = table.skipped.clone();
    let dataset = annotator.annotate(table)?;
    let persisted = rollover.persist(station, &dataset)?;
    Ok(StationOutcome { persisted, skipped })
}

/// Processor for one identifier scheme
pub struct StationProcessor {
    config: Arc<SynopConfig>,
    scheme: StationScheme,
    mode: RunMode,
    scope: StationScope,
    store: Arc<dyn DatasetStore>,
    vocabulary: Arc<dyn StandardNameLookup>,
    created: Option<DateTime<Utc>>,
}

impl StationProcessor {
    /// Create a processor; the station scope defaults to the configured allow-list
    pub fn new(
        config: SynopConfig,
        scheme: StationScheme,
        mode: RunMode,
        store: Arc<dyn DatasetStore>,
    ) -> Result<Self> {
        let vocabulary: Arc<dyn StandardNameLookup> = match &config.processing.standard_names_file {
            Some(path) => Arc::new(CfStandardNameTable::with_extension_file(path)?),
            None => Arc::new(CfStandardNameTable::embedded()),
        };
        let scope = match &config.station_info.stations {
            Some(stations) if !stations.is_empty() => StationScope::Only(stations.clone()),
            _ => StationScope::All,
        };

        Ok(Self {
            config: Arc::new(config),
            scheme,
            mode,
            scope,
            store,
            vocabulary,
            created: None,
        })
    }

    pub fn with_scope(mut self, scope: StationScope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_vocabulary(mut self, vocabulary: Arc<dyn StandardNameLookup>) -> Self {
        self.vocabulary = vocabulary;
        self
    }

    /// Fix the creation timestamp written into every file
    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    /// Main processing entry point
    pub async fn process(&self) -> Result<ProcessingStats> {
        let start_time = Instant::now();
        let destdir = self.config.output.destdir.clone();
        let prefix = self.config.prefix().to_string();

        println!("{}", "Starting BUFR to NetCDF conversion".bright_green().bold());
        println!(
            "  {} {}",
            "Input:".bright_cyan(),
            self.config.station_info.path.display()
        );
        println!("  {} {}", "Output:".bright_cyan(), destdir.display());
        println!("  {} {}", "Station type:".bright_cyan(), self.scheme);

        let mut stats = ProcessingStats {
            output_path: destdir.clone(),
            ..Default::default()
        };

        // Step 1: Discover input files
        println!("\n{}", "Discovering BUFR files...".bright_yellow());
        let discovery = FileDiscovery::new(&self.config.station_info.path, &prefix)?;
        let discovered = discovery.discover().await?;
        stats.files_skipped = discovered.rejected.len();

        let latest_written = match self.mode {
            RunMode::Update => manifest::latest_end_in(&destdir, &prefix, self.scheme)?,
            _ => None,
        };
        let files = select_files(discovered.files, &self.mode, latest_written)?;
        println!(
            "  {} {} input files selected",
            "Found".bright_green(),
            files.len().to_string().bright_white().bold()
        );

        if files.is_empty() {
            println!("\n{}", "No input files to process".bright_yellow());
            stats.processing_time_ms = start_time.elapsed().as_millis();
            return Ok(stats);
        }

        // Step 2: Decode and route subsets
        println!("\n{}", "Decoding files...".bright_yellow());
        let decoder = StreamingDecoder::new(
            BufrDumper::new(self.config.processing.dump_command.clone()),
            self.config.processing.max_concurrent_files,
        );
        let router = StationRouter::new(self.scheme, self.scope.clone());
        let decoded = decoder.decode_and_route(&files, router).await?;

        stats.files_processed = decoded.files_processed;
        stats.records_skipped = decoded.records_skipped;
        stats.subsets_routed = decoded.routed.routed;
        stats.subsets_unrouted = decoded.routed.unrouted;
        stats.malformed_subsets = decoded.routed.malformed;
        stats.stations_without_data = decoded.routed.without_data;

        // Step 3: Convert stations
        let groups = decoded.routed.groups;
        println!(
            "\n{} {} stations...",
            "Converting".bright_yellow(),
            groups.len().to_string().bright_white().bold()
        );

        let mut annotator =
            DatasetAnnotator::new(self.config.clone(), self.scheme, self.vocabulary.clone());
        if let Some(created) = self.created {
            annotator = annotator.with_created(created);
        }
        let rollover = RolloverManager::new(self.store.clone(), &destdir, &prefix, self.scheme);
        let concurrent_limit = self.config.processing.max_concurrent_stations.max(1);

        let results = stream::iter(groups.into_iter_ordered())
            .map(|(station, subsets)| {
                let annotator = annotator.clone();
                let rollover = rollover.clone();
                async move {
                    let worker_station = station.clone();
                    let result = task::spawn_blocking(move || {
                        convert_station(&worker_station, &subsets, &annotator, &rollover)
                    })
                    .await
                    .unwrap_or_else(|e| {
                        Err(SynopError::persistence(
                            &station,
                            format!("station task failed: {}", e),
                        ))
                    });
                    (station, result)
                }
            })
            .buffer_unordered(concurrent_limit)
            .collect::<Vec<_>>()
            .await;

        for (station, result) in results {
            match result {
                Ok(outcome) => {
                    stats.stations_written += 1;
                    stats.files_merged += outcome.persisted.merged;
                    stats.files_written.extend(outcome.persisted.written);
                    stats.malformed_subsets.extend(outcome.skipped);
                }
                Err(e @ SynopError::NoData { .. }) => {
                    warn!("{}", e);
                    stats.stations_without_data.push(Skip {
                        station,
                        reason: e.to_string(),
                    });
                }
                Err(e) if !e.is_fatal() => {
                    warn!("Station {} skipped: {}", station, e);
                    stats.malformed_subsets.push(Skip {
                        station,
                        reason: e.to_string(),
                    });
                }
                Err(e) => {
                    warn!("Station {} failed: {}", station, e);
                    stats.failed_stations.push(Skip {
                        station,
                        reason: e.to_string(),
                    });
                }
            }
        }
        stats.files_written.sort();

        stats.processing_time_ms = start_time.elapsed().as_millis();
        if stats.skipped_count() > 0 {
            warn!("{} subsets or stations were skipped", stats.skipped_count());
        }
        print_summary(&stats);

        if !stats.failed_stations.is_empty() {
            return Err(SynopError::persistence(
                &destdir,
                format!("{} stations could not be written", stats.failed_stations.len()),
            ));
        }
        debug!("Run complete: {:?}", stats);
        Ok(stats)
    }
}

fn print_skips(label: &str, skips: &[Skip]) {
    if skips.is_empty() {
        return;
    }
    println!(
        "  {} {}",
        label.bright_red(),
        skips.len().to_string().bright_red().bold()
    );
    for skip in skips {
        let station = if skip.station.is_empty() {
            "?"
        } else {
            skip.station.as_str()
        };
        println!("    {} {}", station.bright_white(), skip.reason);
    }
}

/// Coloured end-of-run report, including every skip
pub fn print_summary(stats: &ProcessingStats) {
    println!("\n{}", "Processing Summary".bright_green().bold());
    println!(
        "  {} {}ms",
        "Time elapsed:".bright_cyan(),
        stats.processing_time_ms.to_string().bright_white()
    );
    println!(
        "  {} {}",
        "Files decoded:".bright_cyan(),
        stats.files_processed.to_string().bright_white()
    );
    if stats.files_skipped > 0 {
        println!(
            "  {} {}",
            "Files skipped (bad name):".bright_red(),
            stats.files_skipped.to_string().bright_red().bold()
        );
    }
    println!(
        "  {} {} routed, {} other schemes",
        "Subsets:".bright_cyan(),
        stats.subsets_routed.to_string().bright_white(),
        stats.subsets_unrouted
    );
    if stats.records_skipped > 0 {
        println!(
            "  {} {}",
            "Records skipped:".bright_red(),
            stats.records_skipped.to_string().bright_red()
        );
    }
    println!(
        "  {} {}",
        "Stations written:".bright_cyan(),
        stats.stations_written.to_string().bright_white().bold()
    );
    println!(
        "  {} {} ({} merged)",
        "Files written:".bright_cyan(),
        stats.files_written.len().to_string().bright_white().bold(),
        stats.files_merged
    );
    print_skips("Malformed subsets:", &stats.malformed_subsets);
    print_skips("Stations without data:", &stats.stations_without_data);
    print_skips("Failed stations:", &stats.failed_stations);
}
