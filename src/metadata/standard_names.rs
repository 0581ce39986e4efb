//! CF standard name resolution.
//!
//! Lookups go through [`StandardNameLookup`] so the embedded table can be
//! swapped for another vocabulary backend. A backend error never aborts a
//! run; the annotator logs it and leaves the variable without a standard name.

use crate::error::{Result, SynopError};

use std::collections::HashSet;
use std::path::Path;
use tracing::debug;

const EMBEDDED_TABLE: &str = include_str!("cf_standard_names.txt");

/// Exact-match lookup of a normalised variable name
pub trait StandardNameLookup: Send + Sync {
    /// `Ok(None)` when the name is not a standard name
    fn lookup(&self, name: &str) -> Result<Option<String>>;
}

/// In-memory CF standard name table
#[derive(Debug, Clone)]
pub struct CfStandardNameTable {
    names: HashSet<String>,
}

fn parse_names(text: &str) -> impl Iterator<Item = String> + '_ {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
}

impl CfStandardNameTable {
    /// Snapshot compiled into the binary
    pub fn embedded() -> Self {
        Self {
            names: parse_names(EMBEDDED_TABLE).collect(),
        }
    }

    /// Embedded snapshot plus the names listed in `path`, one per line
    pub fn with_extension_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| SynopError::VocabularyLookup {
            name: path.display().to_string(),
            reason: format!("cannot read standard name file: {}", e),
        })?;
        let mut table = Self::embedded();
        let before = table.len();
        table.names.extend(parse_names(&text));
        debug!(
            "Loaded {} extra standard names from {}",
            table.len() - before,
            path.display()
        );
        Ok(table)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

impl Default for CfStandardNameTable {
    fn default() -> Self {
        Self::embedded()
    }
}

impl StandardNameLookup for CfStandardNameTable {
    fn lookup(&self, name: &str) -> Result<Option<String>> {
        Ok(self.names.get(name).cloned())
    }
}
