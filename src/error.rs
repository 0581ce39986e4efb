//! Error handling for SYNOP conversion operations.
//!
//! Every failure the pipeline can hit is one of these variants, so callers
//! can decide per kind whether to abort the run, skip a subset, or record a
//! station as skipped.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SynopError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[cfg(feature = "netcdf")]
    #[error("NetCDF error: {0}")]
    NetCdf(#[from] netcdf::Error),

    #[error("Failed to decode BUFR file: {path} - {reason}")]
    Decode { path: PathBuf, reason: String },

    #[error("Malformed subset for station {station}: {reason}")]
    MalformedSubset { station: String, reason: String },

    #[error("No subsets found for station {station}")]
    NoData { station: String },

    #[error("Standard name lookup failed for '{name}': {reason}")]
    VocabularyLookup { name: String, reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Persistence failed for {path}: {reason}")]
    Persistence { path: PathBuf, reason: String },

    #[error("Input file name does not follow <prefix>_<YYYYMMDDHH>.bufr: {path}")]
    InvalidFileName { path: PathBuf },
}

impl SynopError {
    pub fn configuration(message: impl Into<String>) -> Self {
        SynopError::Configuration {
            message: message.into(),
        }
    }

    pub fn malformed(station: impl Into<String>, reason: impl Into<String>) -> Self {
        SynopError::MalformedSubset {
            station: station.into(),
            reason: reason.into(),
        }
    }

    pub fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        SynopError::Persistence {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Errors after which the run must stop and the CLI exit non-zero
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            SynopError::MalformedSubset { .. }
                | SynopError::NoData { .. }
                | SynopError::VocabularyLookup { .. }
                | SynopError::InvalidFileName { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, SynopError>;
