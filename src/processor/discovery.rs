//! Input file discovery and run-mode selection
//!
//! Input files are named `<prefix>_<YYYYMMDDHH>.bufr`. The timestamp in the
//! name orders the files and drives date-range and update selection without
//! opening them.

use crate::error::{Result, SynopError};
use crate::models::RunMode;

use chrono::{NaiveDate, NaiveDateTime, Timelike};
use regex::Regex;
use std::path::{Path, PathBuf};
use tokio::task;
use tracing::{debug, warn};

/// One input file and the observation hour its name carries
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InputFile {
    pub timestamp: NaiveDateTime,
    pub path: PathBuf,
}

/// Files found in the input directory
#[derive(Debug, Default)]
pub struct Discovered {
    /// Conforming files in chronological order
    pub files: Vec<InputFile>,
    /// Names that matched the prefix but not the timestamp pattern
    pub rejected: Vec<PathBuf>,
}

/// File discovery for one input directory
#[derive(Debug, Clone)]
pub struct FileDiscovery {
    input_dir: PathBuf,
    prefix: String,
    pattern: Regex,
}

impl FileDiscovery {
    pub fn new(input_dir: impl Into<PathBuf>, prefix: &str) -> Result<Self> {
        let pattern = Regex::new(&format!(r"^{}_(\d{{8}})(\d{{2}})\.bufr$", regex::escape(prefix)))
            .map_err(|e| SynopError::configuration(format!("invalid file prefix '{}': {}", prefix, e)))?;
        Ok(Self {
            input_dir: input_dir.into(),
            prefix: prefix.to_string(),
            pattern,
        })
    }

    /// Timestamp embedded in an input file name
    pub fn parse_file_name(&self, path: &Path) -> Result<InputFile> {
        let invalid = || SynopError::InvalidFileName {
            path: path.to_path_buf(),
        };
        let name = path.file_name().and_then(|n| n.to_str()).ok_or_else(invalid)?;
        let captures = self.pattern.captures(name).ok_or_else(invalid)?;

        // chrono will not parse a datetime without minutes, so the hour is read separately
        let date = NaiveDate::parse_from_str(&captures[1], "%Y%m%d")
            .map_err(|_| invalid())?;
        let hour: u32 = captures[2].parse().map_err(|_| invalid())?;
        let timestamp = date.and_hms_opt(hour, 0, 0).ok_or_else(invalid)?;

        Ok(InputFile {
            timestamp,
            path: path.to_path_buf(),
        })
    }

    /// Find every `<prefix>_*.bufr` file in the input directory
    pub async fn discover(&self) -> Result<Discovered> {
        if !self.input_dir.is_dir() {
            return Err(SynopError::configuration(format!(
                "input directory does not exist: {}",
                self.input_dir.display()
            )));
        }

        let pattern = self
            .input_dir
            .join(format!("{}_*.bufr", self.prefix))
            .to_string_lossy()
            .to_string();

        let paths = task::spawn_blocking(move || -> Result<Vec<PathBuf>> {
            let entries = glob::glob(&pattern)
                .map_err(|e| SynopError::configuration(format!("invalid input pattern: {}", e)))?;
            Ok(entries
                .filter_map(|entry| match entry {
                    Ok(path) => Some(path),
                    Err(e) => {
                        warn!("Cannot access input file: {}", e);
                        None
                    }
                })
                .collect())
        })
        .await
        .map_err(|e| SynopError::configuration(format!("file discovery task failed: {}", e)))??;

        let mut discovered = Discovered::default();
        for path in paths {
            match self.parse_file_name(&path) {
                Ok(file) => discovered.files.push(file),
                Err(e) => {
                    warn!("{}", e);
                    discovered.rejected.push(path);
                }
            }
        }
        discovered.files.sort();

        debug!(
            "Discovered {} input files in {} ({} rejected)",
            discovered.files.len(),
            self.input_dir.display(),
            discovered.rejected.len()
        );
        Ok(discovered)
    }
}

/// Files a run covers. `latest_written` is the latest manifest end, used by update runs.
pub fn select_files(
    files: Vec<InputFile>,
    mode: &RunMode,
    latest_written: Option<NaiveDateTime>,
) -> Result<Vec<InputFile>> {
    match mode {
        RunMode::Init => Ok(files),
        RunMode::DateRange { start, end } => {
            if start > end {
                return Err(SynopError::configuration(format!(
                    "start day {} is after end day {}",
                    start, end
                )));
            }
            Ok(files
                .into_iter()
                .filter(|file| {
                    let day = file.timestamp.date();
                    day >= *start && day <= *end
                })
                .collect())
        }
        RunMode::Update => match latest_written {
            Some(latest) => {
                let since = latest
                    .with_minute(0)
                    .and_then(|t| t.with_second(0))
                    .and_then(|t| t.with_nanosecond(0))
                    .unwrap_or(latest);
                debug!("Update run: selecting input files from {}", since);
                Ok(files.into_iter().filter(|file| file.timestamp >= since).collect())
            }
            None => {
                debug!("Update run without manifests: selecting every input file");
                Ok(files)
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::INPUT_TIMESTAMP_FORMAT;
    use tempfile::TempDir;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, 0, 0).unwrap()
    }

    fn create_inputs(temp_dir: &TempDir, names: &[&str]) {
        for name in names {
            std::fs::write(temp_dir.path().join(name), b"BUFR").unwrap();
        }
    }

    fn inputs() -> Vec<InputFile> {
        [at(2022, 3, 23, 18), at(2022, 3, 24, 6), at(2022, 3, 24, 9), at(2022, 3, 25, 0)]
            .into_iter()
            .map(|timestamp| InputFile {
                timestamp,
                path: PathBuf::from(format!("syno_{}.bufr", timestamp.format(INPUT_TIMESTAMP_FORMAT))),
            })
            .collect()
    }

    #[test]
    fn test_parse_file_name() {
        let discovery = FileDiscovery::new("/data", "syno").unwrap();
        let file = discovery.parse_file_name(Path::new("/data/syno_2022032409.bufr")).unwrap();
        assert_eq!(file.timestamp, at(2022, 3, 24, 9));

        for bad in ["syno_20220324.bufr", "syno_2022032425.bufr", "syno_2022133009.bufr", "other_2022032409.bufr"] {
            match discovery.parse_file_name(Path::new(bad)).unwrap_err() {
                SynopError::InvalidFileName { path } => assert_eq!(path, PathBuf::from(bad)),
                other => panic!("Expected InvalidFileName error, got {:?}", other),
            }
        }
    }

    #[tokio::test]
    async fn test_discover_orders_chronologically() {
        let temp_dir = TempDir::new().unwrap();
        create_inputs(
            &temp_dir,
            &[
                "syno_2022032409.bufr",
                "syno_2022032318.bufr",
                "syno_latest.bufr",
                "syno_2022032406.bufr",
                "notes.txt",
            ],
        );

        let discovery = FileDiscovery::new(temp_dir.path(), "syno").unwrap();
        let discovered = discovery.discover().await.unwrap();

        let hours: Vec<NaiveDateTime> = discovered.files.iter().map(|f| f.timestamp).collect();
        assert_eq!(hours, vec![at(2022, 3, 23, 18), at(2022, 3, 24, 6), at(2022, 3, 24, 9)]);
        assert_eq!(discovered.rejected.len(), 1);
        assert!(discovered.rejected[0].ends_with("syno_latest.bufr"));
    }

    #[tokio::test]
    async fn test_discover_missing_directory() {
        let discovery = FileDiscovery::new("/nonexistent/bufr", "syno").unwrap();
        match discovery.discover().await.unwrap_err() {
            SynopError::Configuration { message } => assert!(message.contains("/nonexistent/bufr")),
            other => panic!("Expected Configuration error, got {:?}", other),
        }
    }

    #[test]
    fn test_init_selects_everything() {
        assert_eq!(select_files(inputs(), &RunMode::Init, None).unwrap().len(), 4);
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let mode = RunMode::DateRange {
            start: NaiveDate::from_ymd_opt(2022, 3, 24).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 3, 24).unwrap(),
        };
        let selected = select_files(inputs(), &mode, None).unwrap();
        assert_eq!(selected.len(), 2);
        assert_eq!(selected[0].timestamp, at(2022, 3, 24, 6));
    }

    #[test]
    fn test_reversed_date_range_is_rejected() {
        let mode = RunMode::DateRange {
            start: NaiveDate::from_ymd_opt(2022, 3, 25).unwrap(),
            end: NaiveDate::from_ymd_opt(2022, 3, 24).unwrap(),
        };
        assert!(matches!(
            select_files(inputs(), &mode, None),
            Err(SynopError::Configuration { .. })
        ));
    }

    #[test]
    fn test_update_starts_at_latest_hour() {
        let latest = NaiveDate::from_ymd_opt(2022, 3, 24)
            .unwrap()
            .and_hms_opt(9, 45, 0)
            .unwrap();
        let selected = select_files(inputs(), &RunMode::Update, Some(latest)).unwrap();
        let hours: Vec<NaiveDateTime> = selected.iter().map(|f| f.timestamp).collect();
        assert_eq!(hours, vec![at(2022, 3, 24, 9), at(2022, 3, 25, 0)]);

        // no manifests yet
        assert_eq!(select_files(inputs(), &RunMode::Update, None).unwrap().len(), 4);
    }
}
