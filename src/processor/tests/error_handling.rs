//! Failure and skip reporting during conversion runs

use super::*;
use crate::error::{Result, SynopError};
use crate::metadata::Dataset;
use crate::models::{RunMode, StationScheme};
use crate::processor::StationProcessor;
use crate::store::{DatasetStore, MemoryStore};

use std::path::Path;
use std::sync::Arc;

/// Store that refuses every write
struct ReadOnlyStore;

impl DatasetStore for ReadOnlyStore {
    fn write(&self, path: &Path, _dataset: &Dataset) -> Result<()> {
        Err(SynopError::persistence(path, "read-only file system"))
    }

    fn read(&self, path: &Path) -> Result<Dataset> {
        Err(SynopError::persistence(path, "no such dataset"))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        Err(SynopError::persistence(path, "read-only file system"))
    }

    fn exists(&self, _path: &Path) -> bool {
        false
    }
}

async fn run(fixture: &Fixture, store: Arc<dyn DatasetStore>) -> Result<crate::models::ProcessingStats> {
    StationProcessor::new(fixture.config(), StationScheme::Block, RunMode::Init, store)?
        .with_created(created())
        .process()
        .await
}

#[tokio::test]
async fn test_decoder_failure_stops_run() {
    let fixture = Fixture::new();
    let hour = at(2022, 3, 24, 9);
    fixture.add_file(hour, &[block_report(1, 492, "OSLO - BLINDERN", hour, 271.5)]);
    let broken = fixture.add_undecodable_file(at(2022, 3, 24, 10));

    let store = Arc::new(MemoryStore::new());
    match run(&fixture, store.clone()).await.unwrap_err() {
        SynopError::Decode { path, .. } => assert_eq!(path, broken),
        other => panic!("Expected Decode error, got {:?}", other),
    }
    assert!(store.is_empty());
    assert!(fixture.manifest_files().is_empty());
}

#[tokio::test]
async fn test_missing_input_directory() {
    let fixture = Fixture::new();
    let config = fixture.config().with_input_dir(fixture.temp_dir.path().join("missing"));

    let result = StationProcessor::new(config, StationScheme::Block, RunMode::Init, Arc::new(MemoryStore::new()))
        .unwrap()
        .process()
        .await;
    match result.unwrap_err() {
        SynopError::Configuration { message } => assert!(message.contains("missing")),
        other => panic!("Expected Configuration error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_subset_is_reported() {
    let fixture = Fixture::new();
    let hour = at(2022, 3, 24, 9);
    let mut broken = block_report(1, 384, "GARDERMOEN", hour, 268.5);
    broken.retain(|record| record["key"] != "stationNumber");
    fixture.add_file(
        hour,
        &[broken, block_report(1, 492, "OSLO - BLINDERN", hour, 271.5)],
    );

    let store = Arc::new(MemoryStore::new());
    let stats = run(&fixture, store.clone()).await.unwrap();

    assert_eq!(stats.stations_written, 1);
    assert_eq!(stats.malformed_subsets.len(), 1);
    assert_eq!(stats.malformed_subsets[0].station, "01");
    assert!(stats.malformed_subsets[0].reason.contains("stationNumber"));
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_incomplete_timestamp_skips_subset() {
    let fixture = Fixture::new();
    let first = at(2022, 3, 24, 9);
    let second = at(2022, 3, 24, 10);
    let mut incomplete = block_report(1, 492, "OSLO - BLINDERN", second, 272.5);
    incomplete.retain(|record| record["key"] != "minute");
    fixture.add_file(first, &[block_report(1, 492, "OSLO - BLINDERN", first, 271.5)]);
    fixture.add_file(second, &[incomplete]);

    let store = Arc::new(MemoryStore::new());
    let stats = run(&fixture, store.clone()).await.unwrap();

    assert_eq!(stats.stations_written, 1);
    assert_eq!(stats.malformed_subsets.len(), 1);
    assert_eq!(stats.malformed_subsets[0].station, "01492");
    assert!(stats.malformed_subsets[0].reason.contains("minute"));
    assert_eq!(store.read(&store.paths()[0]).unwrap().frame.height(), 1);
}

#[tokio::test]
async fn test_station_with_only_broken_timestamps_has_no_data() {
    let fixture = Fixture::new();
    let hour = at(2022, 3, 24, 9);
    let mut incomplete = block_report(1, 492, "OSLO - BLINDERN", hour, 271.5);
    incomplete.retain(|record| record["key"] != "year");
    fixture.add_file(hour, &[incomplete]);

    let store = Arc::new(MemoryStore::new());
    let stats = run(&fixture, store.clone()).await.unwrap();

    assert_eq!(stats.stations_written, 0);
    assert_eq!(stats.stations_without_data.len(), 1);
    assert_eq!(stats.stations_without_data[0].station, "01492");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_invalid_file_names_are_counted() {
    let fixture = Fixture::new();
    let hour = at(2022, 3, 24, 9);
    fixture.add_file(hour, &[block_report(1, 492, "OSLO - BLINDERN", hour, 271.5)]);
    fs::write(fixture.input_dir.join("syno_latest.bufr"), b"BUFR").unwrap();
    fs::write(fixture.input_dir.join("syno_2022133009.bufr"), b"BUFR").unwrap();

    let store = Arc::new(MemoryStore::new());
    let stats = run(&fixture, store.clone()).await.unwrap();

    assert_eq!(stats.files_skipped, 2);
    assert_eq!(stats.files_processed, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_empty_selection_is_not_an_error() {
    let fixture = Fixture::new();
    let store = Arc::new(MemoryStore::new());
    let stats = run(&fixture, store.clone()).await.unwrap();

    assert_eq!(stats.files_processed, 0);
    assert_eq!(stats.stations_written, 0);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_failed_station_fails_run() {
    let fixture = Fixture::new();
    let hour = at(2022, 3, 24, 9);
    fixture.add_file(hour, &[block_report(1, 492, "OSLO - BLINDERN", hour, 271.5)]);

    match run(&fixture, Arc::new(ReadOnlyStore)).await.unwrap_err() {
        SynopError::Persistence { reason, .. } => assert!(reason.contains("1 stations")),
        other => panic!("Expected Persistence error, got {:?}", other),
    }
    assert!(fixture.manifest_files().is_empty());
}
