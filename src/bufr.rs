//! Record extraction from BUFR files.
//!
//! Decoding itself is delegated to the ecCodes `bufr_dump` tool. Its flat
//! JSON output (`-j f`) is a `messages` array of `{key, value, code, units}`
//! objects; a `subsetNumber` entry starts each station report.

use crate::constants::{DUMP_ARGS, SUBSET_SENTINEL_KEY};
use crate::error::{Result, SynopError};
use crate::models::{Record, RecordValue, Subset};

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct DumpDocument {
    messages: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    key: String,
    value: serde_json::Value,
    code: String,
    units: String,
}

/// Subsets decoded from one input file
#[derive(Debug, Default)]
pub struct DecodedFile {
    pub path: PathBuf,
    pub subsets: Vec<Subset>,
    pub records_skipped: usize,
}

/// Runs the external decoder and parses its output
#[derive(Debug, Clone)]
pub struct BufrDumper {
    command: String,
}

impl BufrDumper {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
        }
    }

    /// Decode one BUFR file into subsets
    pub async fn decode(&self, path: &Path) -> Result<DecodedFile> {
        debug!("Running {} on {}", self.command, path.display());

        let output = Command::new(&self.command)
            .args(DUMP_ARGS)
            .arg(path)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| SynopError::Decode {
                path: path.to_path_buf(),
                reason: format!("failed to start {}: {}", self.command, e),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SynopError::Decode {
                path: path.to_path_buf(),
                reason: format!("{} exited with {}: {}", self.command, output.status, stderr.trim()),
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_dump(&stdout, path)
    }
}

/// Parse `bufr_dump -j f` output into subsets
pub fn parse_dump(json: &str, path: &Path) -> Result<DecodedFile> {
    let document: DumpDocument = serde_json::from_str(json).map_err(|e| SynopError::Decode {
        path: path.to_path_buf(),
        reason: format!("malformed decoder output: {}", e),
    })?;

    let mut subsets: Vec<Subset> = Vec::new();
    let mut records_skipped = 0usize;
    let mut header_records = 0usize;

    for message in document.messages {
        if message.get("key").and_then(|k| k.as_str()) == Some(SUBSET_SENTINEL_KEY) {
            subsets.push(Vec::new());
            continue;
        }

        let Some(current) = subsets.last_mut() else {
            header_records += 1;
            continue;
        };

        match parse_record(message) {
            Ok(record) => current.push(record),
            Err(reason) => {
                warn!("Skipping record in {}: {}", path.display(), reason);
                records_skipped += 1;
            }
        }
    }

    debug!(
        "Decoded {} subsets from {} ({} header records ignored, {} records skipped)",
        subsets.len(),
        path.display(),
        header_records,
        records_skipped
    );

    Ok(DecodedFile {
        path: path.to_path_buf(),
        subsets,
        records_skipped,
    })
}

fn parse_record(message: serde_json::Value) -> std::result::Result<Record, String> {
    let raw: RawRecord = serde_json::from_value(message).map_err(|e| e.to_string())?;
    let value = RecordValue::from_json(&raw.value)
        .ok_or_else(|| format!("non-scalar value for key {}", raw.key))?;
    Ok(Record::new(raw.key, raw.code, value, raw.units))
}
