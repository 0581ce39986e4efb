//! Pipeline tests for the processor module
//!
//! Runs complete conversions against a fake `bufr_dump` that replays JSON
//! fixtures stored next to each input file.

pub mod error_handling;

use crate::config::{AuthorConfig, SynopConfig};
use crate::constants::INPUT_TIMESTAMP_FORMAT;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use serde_json::{Value, json};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use tempfile::TempDir;

/// Input and output directories plus a fake decoder
pub struct Fixture {
    pub temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub decoder: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let input_dir = temp_dir.path().join("bufr");
        let output_dir = temp_dir.path().join("netcdf");
        fs::create_dir_all(&input_dir).unwrap();
        fs::create_dir_all(&output_dir).unwrap();

        // prints the fixture stored next to the file given as third argument
        let decoder = temp_dir.path().join("fake_bufr_dump");
        fs::write(&decoder, "#!/bin/sh\nexec cat \"$3.json\"\n").unwrap();
        fs::set_permissions(&decoder, fs::Permissions::from_mode(0o755)).unwrap();

        Self {
            temp_dir,
            input_dir,
            output_dir,
            decoder,
        }
    }

    /// Write `<prefix>_<hour>.bufr` and the decoder output replayed for it
    pub fn add_file(&self, hour: NaiveDateTime, reports: &[Vec<Value>]) -> PathBuf {
        let path = self
            .input_dir
            .join(format!("syno_{}.bufr", hour.format(INPUT_TIMESTAMP_FORMAT)));
        fs::write(&path, b"BUFR").unwrap();

        let mut messages = vec![json!({"key": "edition", "value": 4})];
        for report in reports {
            messages.extend(report.iter().cloned());
        }
        let fixture = json!({ "messages": messages });
        fs::write(
            path.with_extension("bufr.json"),
            serde_json::to_string(&fixture).unwrap(),
        )
        .unwrap();
        path
    }

    /// An input file for which the decoder fails
    pub fn add_undecodable_file(&self, hour: NaiveDateTime) -> PathBuf {
        let path = self
            .input_dir
            .join(format!("syno_{}.bufr", hour.format(INPUT_TIMESTAMP_FORMAT)));
        fs::write(&path, b"not BUFR").unwrap();
        path
    }

    pub fn config(&self) -> SynopConfig {
        SynopConfig::default()
            .with_input_dir(&self.input_dir)
            .with_output_dir(&self.output_dir)
            .with_dump_command(self.decoder.to_string_lossy().to_string())
            .with_max_concurrent_files(2)
            .with_author(AuthorConfig {
                institution: "Example Met Service".to_string(),
                license: "CC-BY-4.0".to_string(),
                ..Default::default()
            })
    }

    pub fn manifest_files(&self) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.output_dir)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.to_string_lossy().ends_with(".manifest.json"))
            .collect();
        files.sort();
        files
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
}

pub fn created() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 4, 1, 0, 0, 0).unwrap()
}

fn record(key: &str, value: Value, code: &str, units: &str) -> Value {
    json!({"key": key, "value": value, "code": code, "units": units})
}

fn timestamp_records(time: NaiveDateTime) -> Vec<Value> {
    vec![
        record("year", json!(time.year()), "004001", "a"),
        record("month", json!(time.month()), "004002", "mon"),
        record("day", json!(time.day()), "004003", "d"),
        record("hour", json!(time.hour()), "004004", "h"),
        record("minute", json!(time.minute()), "004005", "min"),
    ]
}

/// One SYNOP report from a block/station-numbered land station
pub fn block_report(block: i64, station: i64, name: &str, time: NaiveDateTime, temperature: f64) -> Vec<Value> {
    let mut report = vec![
        json!({"key": "subsetNumber", "value": 1}),
        record("blockNumber", json!(block), "001001", "Numeric"),
        record("stationNumber", json!(station), "001002", "Numeric"),
        record("stationOrSiteName", json!(format!("{:<20}", name)), "001015", "CCITT IA5"),
        record("stationType", json!(0), "002001", "CODE TABLE"),
    ];
    report.extend(timestamp_records(time));
    report.extend([
        record("latitude", json!(59.9423), "005001", "deg"),
        record("longitude", json!(10.72), "006001", "deg"),
        record("heightOfSensorAboveLocalGroundOrDeckOfMarinePlatform", json!(2.0), "007032", "m"),
        record("airTemperature", json!(temperature), "012101", "K"),
        record("heightOfSensorAboveLocalGroundOrDeckOfMarinePlatform", json!(null), "007032", "m"),
        record("presentWeather", json!(10), "020003", "CODE TABLE"),
        record("delayedDescriptorReplicationFactor", json!(1), "031001", "Numeric"),
        record("timePeriod", json!(-10), "004025", "min"),
        record("maximumWindGustSpeed", json!(12.5), "011041", "m/s"),
    ]);
    report
}

/// One report from a moving ship
pub fn ship_report(identifier: &str, time: NaiveDateTime, latitude: f64, longitude: f64) -> Vec<Value> {
    let mut report = vec![
        json!({"key": "subsetNumber", "value": 1}),
        record("shipOrMobileLandStationIdentifier", json!(identifier), "001011", "CCITT IA5"),
    ];
    report.extend(timestamp_records(time));
    report.extend([
        record("latitude", json!(latitude), "005002", "deg"),
        record("longitude", json!(longitude), "006002", "deg"),
        record("seaSurfaceTemperature", json!(279.0), "022043", "K"),
    ]);
    report
}

/// A WIGOS-identified report, ignored by the other schemes
pub fn wigos_report(local: &str, time: NaiveDateTime) -> Vec<Value> {
    let mut report = vec![
        json!({"key": "subsetNumber", "value": 1}),
        record("wigosIdentifierSeries", json!(0), "001125", "Numeric"),
        record("wigosIssuerOfIdentifier", json!(578), "001126", "Numeric"),
        record("wigosIssueNumber", json!(0), "001127", "Numeric"),
        record("wigosLocalIdentifierCharacter", json!(local), "001128", "CCITT IA5"),
    ];
    report.extend(timestamp_records(time));
    report.push(record("airTemperature", json!(272.0), "012101", "K"));
    report
}
