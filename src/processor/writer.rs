//! Monthly rollover of station datasets
//!
//! A station's dataset is split by calendar month. Each month either becomes
//! a new file, is merged into the file already covering that month, or (when
//! that file was closed in the last hour of the month) continues in a fresh
//! file. The station manifest tracks every file written.

use crate::constants::{FILE_TIMESTAMP_FORMAT, TIME_COLUMN};
use crate::error::{Result, SynopError};
use crate::metadata::{Dataset, apply_fill, epoch_to_datetime, refresh_coverage};
use crate::models::StationScheme;
use crate::store::{DatasetStore, Manifest, ManifestEntry};

use chrono::{Datelike, Duration, NaiveDateTime};
use polars::functions::concat_df_diagonal;
use polars::prelude::*;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Files touched while persisting one station
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PersistOutcome {
    pub written: Vec<PathBuf>,
    pub merged: usize,
}

/// Whether a file ending at `end` closed its month
pub fn is_month_sealed(end: NaiveDateTime) -> bool {
    (end + Duration::hours(1)).month() != end.month()
}

fn month_of(seconds: i64) -> Option<(i32, u32)> {
    epoch_to_datetime(seconds).map(|t| (t.year(), t.month()))
}

/// Make a shared column agree on one dtype: numeric pairs widen to Float32,
/// anything else becomes String
fn align_dtypes(new: &mut DataFrame, old: &mut DataFrame) -> Result<()> {
    let shared: Vec<(String, DataType, DataType)> = new
        .get_columns()
        .iter()
        .filter_map(|column| {
            let other = old.column(column.name()).ok()?;
            (column.dtype() != other.dtype()).then(|| {
                (
                    column.name().to_string(),
                    column.dtype().clone(),
                    other.dtype().clone(),
                )
            })
        })
        .collect();

    for (name, left, right) in shared {
        let target = if left.is_primitive_numeric() && right.is_primitive_numeric() {
            DataType::Float32
        } else {
            DataType::String
        };
        debug!("Column {} changed type ({} vs {}), storing as {}", name, left, right, target);
        let cast = new.column(&name)?.cast(&target)?;
        new.with_column(cast)?;
        let cast = old.column(&name)?.cast(&target)?;
        old.with_column(cast)?;
    }
    Ok(())
}

/// Merge `new` into `old`: rows of `new` win on equal timestamps
pub fn merge_datasets(new: &Dataset, old: &Dataset) -> Result<Dataset> {
    let mut new_frame = new.frame.clone();
    let mut old_frame = old.frame.clone();
    align_dtypes(&mut new_frame, &mut old_frame)?;

    let combined = concat_df_diagonal(&[new_frame, old_frame])?;

    let mut seen = HashSet::new();
    let keep: BooleanChunked = combined
        .column(TIME_COLUMN)?
        .i64()?
        .iter()
        .map(|time| seen.insert(time))
        .collect();
    let frame = combined
        .filter(&keep)?
        .sort([TIME_COLUMN], SortMultipleOptions::default())?;

    let mut variable_attributes = old.variable_attributes.clone();
    variable_attributes.extend(new.variable_attributes.clone());
    let mut scalars = old.scalars.clone();
    scalars.extend(new.scalars.clone());

    let mut merged = Dataset {
        frame,
        scalars,
        variable_attributes,
        global_attributes: new.global_attributes.clone(),
    };
    apply_fill(&mut merged)?;
    refresh_coverage(&mut merged)?;
    Ok(merged)
}

/// Writes station datasets month by month
#[derive(Clone)]
pub struct RolloverManager {
    store: Arc<dyn DatasetStore>,
    destdir: PathBuf,
    prefix: String,
    scheme: StationScheme,
}

impl RolloverManager {
    pub fn new(
        store: Arc<dyn DatasetStore>,
        destdir: impl Into<PathBuf>,
        prefix: impl Into<String>,
        scheme: StationScheme,
    ) -> Self {
        Self {
            store,
            destdir: destdir.into(),
            prefix: prefix.into(),
            scheme,
        }
    }

    /// `<prefix>_<scheme>_<station>_<start>-<end>.nc`
    pub fn file_name(&self, station: &str, start: NaiveDateTime, end: NaiveDateTime) -> String {
        format!(
            "{}_{}_{}_{}-{}.nc",
            self.prefix,
            self.scheme,
            station,
            start.format(FILE_TIMESTAMP_FORMAT),
            end.format(FILE_TIMESTAMP_FORMAT)
        )
    }

    pub fn manifest_path(&self, station: &str) -> PathBuf {
        Manifest::path_for(&self.destdir, &self.prefix, self.scheme, station)
    }

    fn write_new(
        &self,
        station: &str,
        dataset: &Dataset,
        manifest: &mut Manifest,
        superseded: Option<&str>,
    ) -> Result<PathBuf> {
        let (start, end) = dataset
            .time_range()?
            .ok_or_else(|| SynopError::NoData {
                station: station.to_string(),
            })?;
        let file = self.file_name(station, start, end);
        let path = self.destdir.join(&file);

        self.store.write(&path, dataset)?;
        if let Some(old) = superseded.filter(|old| *old != file) {
            let old_path = self.destdir.join(old);
            if self.store.exists(&old_path) {
                self.store.remove(&old_path)?;
            }
        }

        manifest.replace(superseded, ManifestEntry { file, start, end });
        manifest.save(&self.manifest_path(station))?;
        Ok(path)
    }

    /// Persist one station's dataset, merging with files already written
    pub fn persist(&self, station: &str, dataset: &Dataset) -> Result<PersistOutcome> {
        let manifest_path = self.manifest_path(station);
        let mut manifest = Manifest::load_or_new(&manifest_path, station, self.scheme)?;
        let mut outcome = PersistOutcome::default();

        let times = dataset.times()?;
        let months: BTreeSet<(i32, u32)> = times.iter().filter_map(|t| month_of(*t)).collect();

        for (year, month) in months {
            let mask: BooleanChunked = times
                .iter()
                .map(|time| month_of(*time) == Some((year, month)))
                .collect();
            let part = dataset.filter_rows(&mask)?;
            let existing = manifest.entry_for_month(year, month).cloned();

            match existing {
                None => {
                    let path = self.write_new(station, &part, &mut manifest, None)?;
                    outcome.written.push(path);
                }
                Some(entry) if !self.store.exists(&self.destdir.join(&entry.file)) => {
                    warn!(
                        "Station {}: {} is listed in the manifest but missing, writing it afresh",
                        station, entry.file
                    );
                    let path = self.write_new(station, &part, &mut manifest, Some(&entry.file))?;
                    outcome.written.push(path);
                }
                Some(entry) if is_month_sealed(entry.end) => {
                    let cutoff = entry.end.and_utc().timestamp();
                    let later: BooleanChunked = part.times()?.iter().map(|t| *t > cutoff).collect();
                    let part = part.filter_rows(&later)?;
                    if part.frame.height() == 0 {
                        debug!(
                            "Station {} {}-{:02} already closed by {}, nothing newer",
                            station, year, month, entry.file
                        );
                        continue;
                    }
                    let path = self.write_new(station, &part, &mut manifest, None)?;
                    outcome.written.push(path);
                }
                Some(entry) => {
                    let old_path = self.destdir.join(&entry.file);
                    let old = self.store.read(&old_path)?;
                    let merged = merge_datasets(&part, &old)?;
                    let path = self.write_new(station, &merged, &mut manifest, Some(&entry.file))?;
                    info!(
                        "Merged station {} into {} ({} rows)",
                        station,
                        file_label(&path),
                        merged.frame.height()
                    );
                    outcome.merged += 1;
                    outcome.written.push(path);
                }
            }
        }

        Ok(outcome)
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{AttrValue, Attributes};
    use crate::store::MemoryStore;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn dataset(rows: &[(NaiveDateTime, f64)], label: &str) -> Dataset {
        let times: Vec<i64> = rows.iter().map(|(t, _)| t.and_utc().timestamp()).collect();
        let values: Vec<Option<f64>> = rows.iter().map(|(_, v)| Some(*v)).collect();
        let frame = DataFrame::new(vec![
            Column::new(TIME_COLUMN.into(), times),
            Column::new("airTemperature".into(), values),
        ])
        .unwrap();

        let mut globals = Attributes::new();
        globals.insert("title".to_string(), AttrValue::from(label));
        let mut dataset = Dataset {
            frame,
            scalars: BTreeMap::from([("latitude".to_string(), 59.94f32)]),
            variable_attributes: BTreeMap::new(),
            global_attributes: globals,
        };
        apply_fill(&mut dataset).unwrap();
        refresh_coverage(&mut dataset).unwrap();
        dataset
    }

    fn manager(temp_dir: &TempDir, store: Arc<MemoryStore>) -> RolloverManager {
        RolloverManager::new(store, temp_dir.path(), "syno", StationScheme::Block)
    }

    #[test]
    fn test_month_sealing() {
        assert!(is_month_sealed(at(2022, 1, 31, 23)));
        assert!(is_month_sealed(
            NaiveDate::from_ymd_opt(2022, 2, 28).unwrap().and_hms_opt(23, 30, 0).unwrap()
        ));
        assert!(!is_month_sealed(at(2022, 1, 31, 22)));
        assert!(!is_month_sealed(at(2022, 1, 15, 23)));
    }

    #[test]
    fn test_file_name() {
        let temp_dir = TempDir::new().unwrap();
        let manager = manager(&temp_dir, Arc::new(MemoryStore::new()));
        assert_eq!(
            manager.file_name("01492", at(2022, 3, 1, 0), at(2022, 3, 24, 9)),
            "syno_block_01492_20220301T000000-20220324T090000.nc"
        );
    }

    #[test]
    fn test_split_by_month() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&temp_dir, store.clone());

        let data = dataset(&[(at(2022, 1, 30, 12), 270.0), (at(2022, 2, 2, 6), 268.0)], "split");
        let outcome = manager.persist("01492", &data).unwrap();

        assert_eq!(outcome.written.len(), 2);
        assert_eq!(outcome.merged, 0);
        assert_eq!(store.len(), 2);

        let january = store.read(&outcome.written[0]).unwrap();
        assert_eq!(january.frame.height(), 1);
        assert_eq!(january.global_text("time_coverage_start"), Some("2022-01-30 12:00:00"));

        let manifest = Manifest::load(&manager.manifest_path("01492")).unwrap();
        assert_eq!(manifest.entries.len(), 2);
    }

    #[test]
    fn test_monthly_append_newer_values_win() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&temp_dir, store.clone());

        let first: Vec<(NaiveDateTime, f64)> = (1..=15).map(|d| (at(2022, 1, d, 12), 270.0)).collect();
        manager.persist("01492", &dataset(&first, "old")).unwrap();

        let second: Vec<(NaiveDateTime, f64)> = (10..=20).map(|d| (at(2022, 1, d, 12), 280.0)).collect();
        let outcome = manager.persist("01492", &dataset(&second, "new")).unwrap();
        assert_eq!(outcome.merged, 1);

        let paths = store.paths();
        assert_eq!(paths.len(), 1);
        assert!(paths[0].ends_with("syno_block_01492_20220101T120000-20220120T120000.nc"));

        let merged = store.read(&paths[0]).unwrap();
        let times = merged.times().unwrap();
        assert_eq!(times.len(), 20);
        let distinct: HashSet<i64> = times.iter().copied().collect();
        assert_eq!(distinct.len(), 20);

        let temperature = merged.frame.column("airTemperature").unwrap().f32().unwrap();
        assert_eq!(temperature.get(0), Some(270.0));
        assert_eq!(temperature.get(9), Some(280.0));
        assert_eq!(temperature.get(19), Some(280.0));
        assert_eq!(merged.global_text("title"), Some("new"));
        assert_eq!(merged.global_text("time_coverage_start"), Some("2022-01-01 12:00:00"));
        assert_eq!(merged.global_text("time_coverage_end"), Some("2022-01-20 12:00:00"));

        let manifest = Manifest::load(&manager.manifest_path("01492")).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].start, at(2022, 1, 1, 12));
    }

    #[test]
    fn test_sealed_month_starts_fresh_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&temp_dir, store.clone());

        manager
            .persist("01492", &dataset(&[(at(2022, 1, 20, 0), 270.0), (at(2022, 1, 31, 23), 271.0)], "old"))
            .unwrap();

        // 23:00 is already written; only 23:30 is new
        let late = NaiveDate::from_ymd_opt(2022, 1, 31).unwrap().and_hms_opt(23, 30, 0).unwrap();
        let outcome = manager
            .persist("01492", &dataset(&[(at(2022, 1, 31, 23), 275.0), (late, 276.0)], "new"))
            .unwrap();

        assert_eq!(outcome.merged, 0);
        assert_eq!(outcome.written.len(), 1);
        assert_eq!(store.len(), 2);
        let fresh = store.read(&outcome.written[0]).unwrap();
        assert_eq!(fresh.frame.height(), 1);

        // nothing after the sealed end: no new file
        let outcome = manager
            .persist("01492", &dataset(&[(at(2022, 1, 25, 0), 200.0)], "stale"))
            .unwrap();
        assert!(outcome.written.is_empty());
    }

    #[test]
    fn test_missing_file_is_rewritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let manager = manager(&temp_dir, store.clone());

        let first = manager
            .persist("01492", &dataset(&[(at(2022, 1, 1, 0), 270.0)], "old"))
            .unwrap();
        store.remove(&first.written[0]).unwrap();

        let outcome = manager
            .persist("01492", &dataset(&[(at(2022, 1, 2, 0), 271.0)], "new"))
            .unwrap();
        assert_eq!(outcome.merged, 0);
        assert_eq!(store.len(), 1);
        assert_eq!(store.read(&outcome.written[0]).unwrap().frame.height(), 1);

        let manifest = Manifest::load(&manager.manifest_path("01492")).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].start, at(2022, 1, 2, 0));
    }

    #[test]
    fn test_merge_widens_conflicting_types() {
        let old = dataset(&[(at(2022, 1, 1, 0), 270.5)], "old");
        let mut new = dataset(&[(at(2022, 1, 2, 0), 271.0)], "new");
        let ints = Column::new("airTemperature".into(), vec![271i32]);
        new.frame.with_column(ints).unwrap();

        let merged = merge_datasets(&new, &old).unwrap();
        let column = merged.frame.column("airTemperature").unwrap();
        assert_eq!(column.dtype(), &DataType::Float32);
        assert_eq!(
            merged.variable_attributes["airTemperature"].get("_FillValue"),
            Some(&AttrValue::Float(-9999.0))
        );
    }
}
