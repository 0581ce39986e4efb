//! Per-station manifest of written files.
//!
//! `<prefix>_<scheme>_<station>.manifest.json` in the output directory lists
//! every file written for the station with the time range it covers. Update
//! runs and monthly rollover consult it instead of parsing file names.

use super::atomic_write;
use crate::error::{Result, SynopError};
use crate::models::StationScheme;

use chrono::{Datelike, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// File name inside the output directory
    pub file: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
}

impl ManifestEntry {
    pub fn month(&self) -> (i32, u32) {
        (self.start.year(), self.start.month())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub station: String,
    pub scheme: StationScheme,
    #[serde(default)]
    pub entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(station: impl Into<String>, scheme: StationScheme) -> Self {
        Self {
            station: station.into(),
            scheme,
            entries: Vec::new(),
        }
    }

    pub fn path_for(destdir: &Path, prefix: &str, scheme: StationScheme, station: &str) -> PathBuf {
        destdir.join(format!("{}_{}_{}.manifest.json", prefix, scheme, station))
    }

    /// Load the manifest at `path`, or start an empty one
    pub fn load_or_new(path: &Path, station: &str, scheme: StationScheme) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::new(station, scheme));
        }
        Self::load(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| SynopError::persistence(path, format!("cannot read manifest: {}", e)))?;
        let manifest: Manifest = serde_json::from_str(&text)
            .map_err(|e| SynopError::persistence(path, format!("invalid manifest: {}", e)))?;
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        atomic_write(path, |tmp| {
            std::fs::write(tmp, &text)?;
            Ok(())
        })
    }

    /// Entry covering the given calendar month; the one reaching furthest wins
    pub fn entry_for_month(&self, year: i32, month: u32) -> Option<&ManifestEntry> {
        self.entries
            .iter()
            .filter(|entry| entry.month() == (year, month))
            .max_by_key(|entry| entry.end)
    }

    /// Drop the entry for `superseded` (if any) and record `entry`
    pub fn replace(&mut self, superseded: Option<&str>, entry: ManifestEntry) {
        if let Some(file) = superseded {
            self.entries.retain(|e| e.file != file);
        }
        self.entries.retain(|e| e.file != entry.file);
        self.entries.push(entry);
        self.entries.sort_by_key(|e| e.start);
    }

    pub fn latest_end(&self) -> Option<NaiveDateTime> {
        self.entries.iter().map(|entry| entry.end).max()
    }
}

/// Latest end time recorded by any manifest of `scheme` in `destdir`
pub fn latest_end_in(destdir: &Path, prefix: &str, scheme: StationScheme) -> Result<Option<NaiveDateTime>> {
    let pattern = destdir.join(format!("{}_{}_*.manifest.json", prefix, scheme));
    let pattern = pattern.to_string_lossy();
    let paths = glob::glob(&pattern)
        .map_err(|e| SynopError::configuration(format!("invalid manifest pattern: {}", e)))?;

    let mut latest: Option<NaiveDateTime> = None;
    let mut count = 0usize;
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                warn!("Cannot access manifest: {}", e);
                continue;
            }
        };
        let manifest = Manifest::load(&path)?;
        count += 1;
        latest = latest.max(manifest.latest_end());
    }

    debug!("Scanned {} manifests, latest end {:?}", count, latest);
    Ok(latest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn entry(file: &str, start: NaiveDateTime, end: NaiveDateTime) -> ManifestEntry {
        ManifestEntry {
            file: file.to_string(),
            start,
            end,
        }
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = Manifest::path_for(temp_dir.path(), "syno", StationScheme::Block, "01492");
        assert!(path.ends_with("syno_block_01492.manifest.json"));

        let mut manifest = Manifest::load_or_new(&path, "01492", StationScheme::Block).unwrap();
        assert!(manifest.entries.is_empty());

        manifest.replace(None, entry("a.nc", at(2022, 1, 1, 0), at(2022, 1, 15, 0)));
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_entry_for_month_prefers_latest_end() {
        let mut manifest = Manifest::new("01492", StationScheme::Block);
        manifest.replace(None, entry("jan-a.nc", at(2022, 1, 1, 0), at(2022, 1, 10, 0)));
        manifest.replace(None, entry("jan-b.nc", at(2022, 1, 12, 0), at(2022, 1, 20, 0)));
        manifest.replace(None, entry("feb.nc", at(2022, 2, 1, 0), at(2022, 2, 3, 0)));

        assert_eq!(manifest.entry_for_month(2022, 1).unwrap().file, "jan-b.nc");
        assert_eq!(manifest.entry_for_month(2022, 2).unwrap().file, "feb.nc");
        assert!(manifest.entry_for_month(2022, 3).is_none());
        assert_eq!(manifest.latest_end(), Some(at(2022, 2, 3, 0)));
    }

    #[test]
    fn test_replace_drops_superseded_entry() {
        let mut manifest = Manifest::new("01492", StationScheme::Block);
        manifest.replace(None, entry("old.nc", at(2022, 1, 1, 0), at(2022, 1, 15, 0)));
        manifest.replace(Some("old.nc"), entry("new.nc", at(2022, 1, 1, 0), at(2022, 1, 20, 0)));

        assert_eq!(manifest.entries.len(), 1);
        assert_eq!(manifest.entries[0].file, "new.nc");
    }

    #[test]
    fn test_latest_end_across_manifests() {
        let temp_dir = TempDir::new().unwrap();
        assert_eq!(latest_end_in(temp_dir.path(), "syno", StationScheme::Block).unwrap(), None);

        for (station, end) in [("01492", at(2022, 3, 1, 6)), ("01384", at(2022, 3, 2, 18))] {
            let mut manifest = Manifest::new(station, StationScheme::Block);
            manifest.replace(None, entry("x.nc", at(2022, 3, 1, 0), end));
            manifest
                .save(&Manifest::path_for(temp_dir.path(), "syno", StationScheme::Block, station))
                .unwrap();
        }
        // other schemes are ignored
        let mut ship = Manifest::new("LDWR", StationScheme::Ship);
        ship.replace(None, entry("s.nc", at(2022, 4, 1, 0), at(2022, 4, 2, 0)));
        ship.save(&Manifest::path_for(temp_dir.path(), "syno", StationScheme::Ship, "LDWR"))
            .unwrap();

        assert_eq!(
            latest_end_in(temp_dir.path(), "syno", StationScheme::Block).unwrap(),
            Some(at(2022, 3, 2, 18))
        );
    }

    #[test]
    fn test_corrupt_manifest_is_persistence_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.manifest.json");
        std::fs::write(&path, "{not json").unwrap();

        match Manifest::load(&path).unwrap_err() {
            SynopError::Persistence { path: failed, .. } => assert_eq!(failed, path),
            other => panic!("Expected Persistence error, got {:?}", other),
        }
    }
}
