//! Dataset persistence.
//!
//! Backends implement [`DatasetStore`]. Every write lands in a temporary file
//! next to its destination and is renamed into place, so an interrupted
//! update never leaves a half-written or missing station file behind.

pub mod manifest;
pub mod memory;
#[cfg(feature = "netcdf")]
pub mod netcdf;

pub use manifest::{Manifest, ManifestEntry};
pub use memory::MemoryStore;
#[cfg(feature = "netcdf")]
pub use self::netcdf::NetcdfStore;

use crate::error::{Result, SynopError};
use crate::metadata::Dataset;

use std::path::Path;
use tempfile::NamedTempFile;
use tracing::debug;

/// Storage backend for annotated datasets
pub trait DatasetStore: Send + Sync {
    /// Create or replace the dataset at `path`
    fn write(&self, path: &Path, dataset: &Dataset) -> Result<()>;

    fn read(&self, path: &Path) -> Result<Dataset>;

    fn remove(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Run `write` against a temporary path in the destination directory, then
/// rename the result over `path`
pub fn atomic_write<F>(path: &Path, write: F) -> Result<()>
where
    F: FnOnce(&Path) -> Result<()>,
{
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let temp = NamedTempFile::new_in(parent)
        .map_err(|e| SynopError::persistence(path, format!("cannot create temporary file: {}", e)))?
        .into_temp_path();

    write(&temp)?;

    temp.persist(path)
        .map_err(|e| SynopError::persistence(path, format!("atomic rename failed: {}", e.error)))?;
    debug!("Wrote {}", path.display());
    Ok(())
}
