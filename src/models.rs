//! Core data structures and types for SYNOP processing.
//!
//! Defines decoded records and subsets, the station identifier schemes,
//! run modes and the statistics reported at the end of a run.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::constants::identifiers;

/// Value of one decoded BUFR element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RecordValue {
    Int(i64),
    Float(f64),
    Text(String),
    Missing,
}

impl RecordValue {
    /// Convert a JSON scalar; arrays and objects are not record values
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Null => Some(RecordValue::Missing),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Some(RecordValue::Int(i)),
                None => n.as_f64().map(RecordValue::Float),
            },
            serde_json::Value::String(s) => Some(RecordValue::Text(s.trim().to_string())),
            serde_json::Value::Bool(b) => Some(RecordValue::Int(i64::from(*b))),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, RecordValue::Missing)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RecordValue::Int(i) => Some(*i as f64),
            RecordValue::Float(f) => Some(*f),
            RecordValue::Text(s) => s.parse().ok(),
            RecordValue::Missing => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RecordValue::Int(i) => Some(*i),
            RecordValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            RecordValue::Text(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Magnitude rendering used for time-period descriptions
    pub fn abs_display(&self) -> String {
        match self {
            RecordValue::Int(i) => i.abs().to_string(),
            RecordValue::Float(f) => f.abs().to_string(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Int(i) => write!(f, "{}", i),
            RecordValue::Float(v) => write!(f, "{}", v),
            RecordValue::Text(s) => write!(f, "{}", s),
            RecordValue::Missing => write!(f, "null"),
        }
    }
}

/// A height or time-period record that applies to the records after it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Qualifier {
    pub key: String,
    pub value: RecordValue,
    pub units: String,
}

impl Qualifier {
    /// "2 m" style rendering
    pub fn describe(&self) -> String {
        format!("{} {}", self.value, self.units)
    }

    /// "10 min" style rendering, sign dropped
    pub fn describe_duration(&self) -> String {
        format!("{} {}", self.value.abs_display(), self.units)
    }
}

/// One decoded `{key, code, value, units}` element plus its qualifier context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub key: String,
    pub code: String,
    pub value: RecordValue,
    pub units: String,
    pub height: Option<Qualifier>,
    pub time: Option<Qualifier>,
}

impl Record {
    pub fn new(
        key: impl Into<String>,
        code: impl Into<String>,
        value: RecordValue,
        units: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            code: code.into(),
            value,
            units: units.into(),
            height: None,
            time: None,
        }
    }

    pub fn as_qualifier(&self) -> Qualifier {
        Qualifier {
            key: self.key.clone(),
            value: self.value.clone(),
            units: self.units.clone(),
        }
    }
}

/// One station report: the records between two subset sentinels
pub type Subset = Vec<Record>;

/// CF discrete sampling geometry of the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureType {
    TimeSeries,
    Trajectory,
}

impl FeatureType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureType::TimeSeries => "timeSeries",
            FeatureType::Trajectory => "trajectory",
        }
    }
}

/// Station identifier schemes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StationScheme {
    Block,
    State,
    Wigos,
    Ship,
}

impl StationScheme {
    /// Name used on the command line and in output file names
    pub fn as_str(&self) -> &'static str {
        match self {
            StationScheme::Block => "block",
            StationScheme::State => "state",
            StationScheme::Wigos => "wigos",
            StationScheme::Ship => "ship",
        }
    }

    /// Identifier keys expected at the head of every subset, in order
    pub fn identifier_keys(&self) -> &'static [&'static str] {
        match self {
            StationScheme::Block => &[identifiers::BLOCK_NUMBER, identifiers::STATION_NUMBER],
            StationScheme::State => &[
                identifiers::STATE_IDENTIFIER,
                identifiers::NATIONAL_STATION_NUMBER,
            ],
            StationScheme::Wigos => &[
                identifiers::WIGOS_SERIES,
                identifiers::WIGOS_ISSUER,
                identifiers::WIGOS_ISSUE_NUMBER,
                identifiers::WIGOS_LOCAL,
            ],
            StationScheme::Ship => &[identifiers::SHIP_IDENTIFIER],
        }
    }

    /// Join identifier values into the canonical station key
    pub fn station_key(&self, values: &[&RecordValue]) -> String {
        match self {
            StationScheme::Block => {
                let widths = [2usize, 3];
                values
                    .iter()
                    .zip(widths)
                    .map(|(value, width)| format!("{:0>width$}", value.to_string(), width = width))
                    .collect()
            }
            _ => values
                .iter()
                .map(|value| value.to_string())
                .collect::<Vec<_>>()
                .join("-"),
        }
    }

    pub fn feature_type(&self) -> FeatureType {
        match self {
            StationScheme::Ship => FeatureType::Trajectory,
            _ => FeatureType::TimeSeries,
        }
    }

    /// Phrase naming the identifier in titles
    pub fn title_label(&self) -> &'static str {
        match self {
            StationScheme::Block => "station identifier number",
            StationScheme::Wigos => "wigos identifier number",
            StationScheme::State => "identifier number",
            StationScheme::Ship => "ship identifier number",
        }
    }

    /// Title used when the reports carry no station name
    pub fn anonymous_title(&self, station_key: &str) -> String {
        match self {
            StationScheme::Ship => format!(
                "Measurement from moving station with identifier number {}",
                station_key
            ),
            _ => format!(
                "Measurements from station with {} {}",
                self.title_label(),
                station_key
            ),
        }
    }
}

impl fmt::Display for StationScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which input files a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Every input file
    Init,
    /// Input files at or after the latest timestamp already written
    Update,
    /// Input files whose date lies in the inclusive range
    DateRange { start: NaiveDate, end: NaiveDate },
}

/// Which stations a run covers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StationScope {
    All,
    Only(Vec<String>),
}

impl StationScope {
    pub fn includes(&self, station: &str) -> bool {
        match self {
            StationScope::All => true,
            StationScope::Only(stations) => stations.iter().any(|s| s == station),
        }
    }
}

/// Reason a station or subset was left out of the output
#[derive(Debug, Clone, PartialEq)]
pub struct Skip {
    pub station: String,
    pub reason: String,
}

/// Processing statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub files_processed: usize,
    pub files_skipped: usize,
    pub records_skipped: usize,
    pub subsets_routed: usize,
    pub subsets_unrouted: usize,
    pub malformed_subsets: Vec<Skip>,
    pub stations_without_data: Vec<Skip>,
    pub failed_stations: Vec<Skip>,
    pub stations_written: usize,
    pub files_written: Vec<PathBuf>,
    pub files_merged: usize,
    pub output_path: PathBuf,
    pub processing_time_ms: u128,
}

impl ProcessingStats {
    pub fn skipped_count(&self) -> usize {
        self.malformed_subsets.len() + self.stations_without_data.len() + self.failed_stations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_key_is_zero_padded() {
        let block = RecordValue::Int(1);
        let station = RecordValue::Int(492);
        assert_eq!(StationScheme::Block.station_key(&[&block, &station]), "01492");
    }

    #[test]
    fn test_wigos_key_is_hyphen_joined() {
        let values = [
            RecordValue::Int(0),
            RecordValue::Int(578),
            RecordValue::Int(0),
            RecordValue::Text("1492".to_string()),
        ];
        let refs: Vec<&RecordValue> = values.iter().collect();
        assert_eq!(StationScheme::Wigos.station_key(&refs), "0-578-0-1492");
    }

    #[test]
    fn test_ship_is_trajectory() {
        assert_eq!(StationScheme::Ship.feature_type(), FeatureType::Trajectory);
        assert_eq!(StationScheme::Block.feature_type(), FeatureType::TimeSeries);
        assert_eq!(
            StationScheme::Ship.anonymous_title("LDWR"),
            "Measurement from moving station with identifier number LDWR"
        );
    }

    #[test]
    fn test_record_value_from_json() {
        assert_eq!(
            RecordValue::from_json(&serde_json::json!(5)),
            Some(RecordValue::Int(5))
        );
        assert_eq!(
            RecordValue::from_json(&serde_json::json!(271.15)),
            Some(RecordValue::Float(271.15))
        );
        assert_eq!(
            RecordValue::from_json(&serde_json::json!("BERGEN   ")),
            Some(RecordValue::Text("BERGEN".to_string()))
        );
        assert_eq!(
            RecordValue::from_json(&serde_json::Value::Null),
            Some(RecordValue::Missing)
        );
        assert_eq!(RecordValue::from_json(&serde_json::json!([1, 2])), None);
    }

    #[test]
    fn test_duration_drops_sign() {
        let q = Qualifier {
            key: "timePeriod".to_string(),
            value: RecordValue::Int(-10),
            units: "min".to_string(),
        };
        assert_eq!(q.describe_duration(), "10 min");
    }
}
