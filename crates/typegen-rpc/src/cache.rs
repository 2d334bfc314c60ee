//! On-disk cache of the last fetched payload.
//!
//! `typegen check` decodes the cache instead of calling the node, so CI can
//! verify committed bindings offline.

use std::path::Path;

use crate::error::FetchError;

/// Default cache location relative to the project root.
pub const DEFAULT_CACHE_FILE: &str = ".typegen/metadata.scale";

/// Write `bytes` to `path`, creating parent directories.
///
/// The payload is written to a sibling temporary file and renamed into
/// place, so readers never observe a half-written cache.
pub fn write_cache(path: &Path, bytes: &[u8]) -> Result<(), FetchError> {
    let io_err = |source| FetchError::Cache {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    std::fs::write(&tmp, bytes).map_err(io_err)?;
    std::fs::rename(&tmp, path).map_err(io_err)?;
    tracing::debug!(path = %path.display(), bytes = bytes.len(), "wrote metadata cache");
    Ok(())
}

/// Read a cached payload.
pub fn read_cache(path: &Path) -> Result<Vec<u8>, FetchError> {
    std::fs::read(path).map_err(|source| FetchError::Cache {
        path: path.to_path_buf(),
        source,
    })
}
