//! On-disk working directories.

use folio_shared::{FolioError, Paths, Result};

/// Create the cache and output directories if they are missing.
///
/// Existing directories and their contents are left alone. Run this before
/// taking the [`ContentCache`](crate::ContentCache) snapshot.
pub fn bootstrap(paths: &Paths) -> Result<()> {
    for dir in [&paths.cache_dir, &paths.output_dir] {
        if !dir.is_dir() {
            std::fs::create_dir_all(dir).map_err(|e| FolioError::io(dir, e))?;
            tracing::info!(?dir, "created directory");
        }
    }
    Ok(())
}
