//! In-memory dataset store for tests and dry runs.

use super::DatasetStore;
use crate::error::{Result, SynopError};
use crate::metadata::Dataset;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Default)]
pub struct MemoryStore {
    datasets: Mutex<HashMap<PathBuf, Dataset>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored paths, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = match self.datasets.lock() {
            Ok(datasets) => datasets.keys().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().keys().cloned().collect(),
        };
        paths.sort();
        paths
    }

    pub fn len(&self) -> usize {
        self.paths().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self, path: &Path) -> Result<std::sync::MutexGuard<'_, HashMap<PathBuf, Dataset>>> {
        self.datasets
            .lock()
            .map_err(|_| SynopError::persistence(path, "memory store lock poisoned"))
    }
}

impl DatasetStore for MemoryStore {
    fn write(&self, path: &Path, dataset: &Dataset) -> Result<()> {
        self.lock(path)?.insert(path.to_path_buf(), dataset.clone());
        Ok(())
    }

    fn read(&self, path: &Path) -> Result<Dataset> {
        self.lock(path)?
            .get(path)
            .cloned()
            .ok_or_else(|| SynopError::persistence(path, "no such dataset"))
    }

    fn remove(&self, path: &Path) -> Result<()> {
        self.lock(path)?
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| SynopError::persistence(path, "no such dataset"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock(path)
            .map(|datasets| datasets.contains_key(path))
            .unwrap_or(false)
    }
}
