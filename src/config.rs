//! Configuration management and validation.
//!
//! The YAML configuration document names the input and output directories,
//! the optional station allow-list and the static provenance block that is
//! copied into every output file. It is loaded once per run and passed
//! explicitly through the pipeline.

use crate::constants::{DEFAULT_DUMP_COMMAND, DEFAULT_FILE_PREFIX};
use crate::error::{Result, SynopError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Where the BUFR input lives and which stations to convert
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StationInfo {
    /// Directory holding `<prefix>_<YYYYMMDDHH>.bufr` files
    pub path: PathBuf,

    /// Explicit station allow-list (station keys)
    #[serde(default)]
    pub stations: Option<Vec<String>>,

    /// File prefix shared by input and output names
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

/// Output location and dataset description
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub destdir: PathBuf,

    /// Copied to the `summary` attribute
    #[serde(rename = "abstract")]
    pub summary: String,

    pub source: String,
}

/// Creator, publisher and licensing fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorConfig {
    pub creator_type: String,

    #[serde(rename = "PrincipalInvestigator")]
    pub creator_name: String,

    #[serde(rename = "PrincipalInvestigatorEmail")]
    pub creator_email: String,

    #[serde(rename = "PrincipalInvestigatorOrganisation")]
    pub institution: String,

    #[serde(rename = "PrincipalInvestigatorOrganisationURL")]
    pub creator_url: String,

    #[serde(rename = "Publisher")]
    pub publisher_name: String,

    #[serde(rename = "PublisherEmail")]
    pub publisher_email: String,

    #[serde(rename = "PublisherURL")]
    pub publisher_url: String,

    #[serde(rename = "Project")]
    pub project: String,

    #[serde(rename = "License")]
    pub license: String,
}

/// Tuning knobs; every field has a default
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Decoder executable, invoked as `<cmd> -j f <file>`
    pub dump_command: String,

    /// Maximum decoder subprocesses running at once
    pub max_concurrent_files: usize,

    /// Maximum stations assembled and written at once
    pub max_concurrent_stations: usize,

    /// Extra CF standard names, one per line
    pub standard_names_file: Option<PathBuf>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        let cpus = num_cpus::get().max(1);
        Self {
            dump_command: DEFAULT_DUMP_COMMAND.to_string(),
            max_concurrent_files: cpus,
            max_concurrent_stations: cpus,
            standard_names_file: None,
        }
    }
}

/// Main configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynopConfig {
    pub station_info: StationInfo,
    pub output: OutputConfig,
    #[serde(default)]
    pub author: AuthorConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
}

fn default_prefix() -> String {
    DEFAULT_FILE_PREFIX.to_string()
}

impl Default for SynopConfig {
    fn default() -> Self {
        Self {
            station_info: StationInfo {
                path: PathBuf::from("."),
                stations: None,
                prefix: default_prefix(),
            },
            output: OutputConfig {
                destdir: PathBuf::from("."),
                summary: String::new(),
                source: String::new(),
            },
            author: AuthorConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl SynopConfig {
    /// Parse a YAML configuration document
    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: SynopConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate the configuration file, creating the output directory
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            SynopError::configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::from_yaml(&text)?;

        if !config.station_info.path.is_dir() {
            return Err(SynopError::configuration(format!(
                "station_info.path is not a directory: {}",
                config.station_info.path.display()
            )));
        }
        std::fs::create_dir_all(&config.output.destdir)?;

        debug!(
            "Loaded configuration from {}: input {}, output {}",
            path.display(),
            config.station_info.path.display(),
            config.output.destdir.display()
        );
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.station_info.prefix.is_empty() || self.station_info.prefix.contains('/') {
            return Err(SynopError::configuration(format!(
                "invalid file prefix '{}'",
                self.station_info.prefix
            )));
        }
        if self.processing.dump_command.trim().is_empty() {
            return Err(SynopError::configuration("processing.dump_command is empty"));
        }
        if self.processing.max_concurrent_files == 0 || self.processing.max_concurrent_stations == 0
        {
            return Err(SynopError::configuration(
                "concurrency limits must be at least 1",
            ));
        }
        Ok(())
    }

    pub fn with_input_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.station_info.path = path.into();
        self
    }

    pub fn with_output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.destdir = path.into();
        self
    }

    pub fn with_stations(mut self, stations: Vec<String>) -> Self {
        self.station_info.stations = Some(stations);
        self
    }

    pub fn with_dump_command(mut self, command: impl Into<String>) -> Self {
        self.processing.dump_command = command.into();
        self
    }

    pub fn with_max_concurrent_files(mut self, max_files: usize) -> Self {
        self.processing.max_concurrent_files = max_files;
        self
    }

    pub fn with_author(mut self, author: AuthorConfig) -> Self {
        self.author = author;
        self
    }

    pub fn prefix(&self) -> &str {
        &self.station_info.prefix
    }
}
