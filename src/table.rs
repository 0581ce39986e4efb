//! Tabular assembly of one station's subsets.
//!
//! Each subset becomes one wide row keyed by variable name. Rows are merged
//! into a time-indexed polars `DataFrame`, while units, codes and qualifier
//! descriptions are collected per variable for the metadata stage.

use crate::constants::{FILTERED_KEYS, TIME_COLUMN, TIMESTAMP_KEYS};
use crate::error::{Result, SynopError};
use crate::models::{Record, RecordValue, Skip, Subset};
use crate::qualifier::is_qualifier;

use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Side-table entry for one variable: first subset defining it wins
#[derive(Debug, Clone, PartialEq)]
pub struct VariableInfo {
    pub units: String,
    pub code: String,
    /// "2 m" style sensor height
    pub height: Option<String>,
    /// "10 min" style averaging period
    pub time: Option<String>,
}

impl VariableInfo {
    fn from_record(record: &Record) -> Self {
        Self {
            units: record.units.clone(),
            code: record.code.clone(),
            height: record.height.as_ref().map(|q| q.describe()),
            time: record.time.as_ref().map(|q| q.describe_duration()),
        }
    }
}

/// All observations of one station as a time-indexed table
#[derive(Debug, Clone)]
pub struct StationFrame {
    pub station: String,
    /// `time` (Int64 epoch seconds) followed by one column per variable
    pub frame: DataFrame,
    pub variables: BTreeMap<String, VariableInfo>,
    /// Subsets left out because their timestamp was incomplete
    pub skipped: Vec<Skip>,
}

/// Suffix repeated names positionally: `a, b, a, a` becomes `a, b, a.1, a.2`
pub fn dedup_names<S: AsRef<str>>(keys: &[S]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    keys.iter()
        .map(|key| {
            let key = key.as_ref();
            let count = seen.entry(key).or_insert(0);
            let name = if *count == 0 {
                key.to_string()
            } else {
                format!("{}.{}", key, count)
            };
            *count += 1;
            name
        })
        .collect()
}

/// Drop qualifier records, missing values and replication bookkeeping
pub fn filter_section(subset: &[Record]) -> Vec<&Record> {
    subset
        .iter()
        .filter(|record| {
            !record.value.is_missing()
                && !is_qualifier(record)
                && !FILTERED_KEYS.contains(&record.key.as_str())
        })
        .collect()
}

fn timestamp(station: &str, row: &[(String, &Record)]) -> Result<i64> {
    let mut parts = [0i64; 5];
    for (slot, key) in parts.iter_mut().zip(TIMESTAMP_KEYS) {
        let (_, record) = row
            .iter()
            .find(|(name, _)| name == key)
            .ok_or_else(|| SynopError::malformed(station, format!("missing {}", key)))?;
        *slot = record.value.as_i64().ok_or_else(|| {
            SynopError::malformed(station, format!("{} is not an integer: {}", key, record.value))
        })?;
    }
    let [year, month, day, hour, minute] = parts;

    let invalid = || {
        SynopError::malformed(
            station,
            format!(
                "invalid timestamp {}-{}-{} {}:{}",
                year, month, day, hour, minute
            ),
        )
    };
    let date = NaiveDate::from_ymd_opt(
        i32::try_from(year).map_err(|_| invalid())?,
        u32::try_from(month).map_err(|_| invalid())?,
        u32::try_from(day).map_err(|_| invalid())?,
    )
    .ok_or_else(invalid)?;
    let datetime = date
        .and_hms_opt(
            u32::try_from(hour).map_err(|_| invalid())?,
            u32::try_from(minute).map_err(|_| invalid())?,
            0,
        )
        .ok_or_else(invalid)?;

    Ok(datetime.and_utc().timestamp())
}

/// Pivot one station's subsets into a single sorted table
pub fn assemble(station: &str, subsets: &[Subset]) -> Result<StationFrame> {
    if subsets.is_empty() {
        return Err(SynopError::NoData {
            station: station.to_string(),
        });
    }

    let mut columns: Vec<String> = Vec::new();
    let mut variables: BTreeMap<String, VariableInfo> = BTreeMap::new();
    // Keyed by epoch seconds; a later subset replaces an earlier one at the same time
    let mut rows: BTreeMap<i64, HashMap<String, RecordValue>> = BTreeMap::new();
    let mut skipped = Vec::new();

    for subset in subsets {
        let records = filter_section(subset);
        let names = dedup_names(&records.iter().map(|r| r.key.as_str()).collect::<Vec<_>>());
        let row: Vec<(String, &Record)> = names.into_iter().zip(records).collect();

        let time = match timestamp(station, &row) {
            Ok(time) => time,
            Err(SynopError::MalformedSubset { station, reason }) => {
                warn!("Skipping subset for station {}: {}", station, reason);
                skipped.push(Skip { station, reason });
                continue;
            }
            Err(e) => return Err(e),
        };

        let mut values = HashMap::with_capacity(row.len());
        for (name, record) in row {
            if TIMESTAMP_KEYS.contains(&name.as_str()) {
                continue;
            }
            if !variables.contains_key(&name) {
                variables.insert(name.clone(), VariableInfo::from_record(record));
                columns.push(name.clone());
            }
            values.insert(name, record.value.clone());
        }
        rows.insert(time, values);
    }

    if rows.is_empty() {
        return Err(SynopError::NoData {
            station: station.to_string(),
        });
    }

    let times: Vec<i64> = rows.keys().copied().collect();
    let mut frame_columns = Vec::with_capacity(columns.len() + 1);
    frame_columns.push(Column::new(TIME_COLUMN.into(), times));
    for name in &columns {
        let values: Vec<Option<&RecordValue>> =
            rows.values().map(|row| row.get(name)).collect();
        frame_columns.push(coerce_column(name, &values));
    }

    let frame = DataFrame::new(frame_columns)?;
    debug!(
        "Assembled station {}: {} rows x {} variables ({} subsets skipped)",
        station,
        frame.height(),
        columns.len(),
        skipped.len()
    );

    Ok(StationFrame {
        station: station.to_string(),
        frame,
        variables,
        skipped,
    })
}

/// Integral values become Int64, other numbers Float64, anything else String
pub fn coerce_column(name: &str, values: &[Option<&RecordValue>]) -> Column {
    let present = || values.iter().flatten();

    let all_integral = present().all(|value| match value {
        RecordValue::Int(_) => true,
        RecordValue::Text(s) => s.parse::<i64>().is_ok(),
        _ => false,
    });
    if all_integral {
        let column: Vec<Option<i64>> = values
            .iter()
            .map(|value| value.and_then(RecordValue::as_i64))
            .collect();
        return Column::new(name.into(), column);
    }

    if present().all(|value| value.as_f64().is_some()) {
        let column: Vec<Option<f64>> = values
            .iter()
            .map(|value| value.and_then(RecordValue::as_f64))
            .collect();
        return Column::new(name.into(), column);
    }

    let column: Vec<Option<String>> = values
        .iter()
        .map(|value| value.map(|v| v.to_string()))
        .collect();
    Column::new(name.into(), column)
}
