//! Per-invocation scratch directory.
//!
//! The directory and everything in it is removed when the `ScratchSpace` is
//! dropped, on success, on error, and on cancellation alike.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

use agri_common::{AgriResult, Band};

pub struct ScratchSpace {
    dir: TempDir,
}

impl ScratchSpace {
    /// Create a fresh directory under the system temp location.
    pub fn new() -> AgriResult<Self> {
        let dir = tempfile::Builder::new().prefix("agri-scene-").tempdir()?;
        debug!(path = %dir.path().display(), "Created scratch directory");
        Ok(Self { dir })
    }

    /// Create a fresh directory under `parent`.
    pub fn new_in<P: AsRef<Path>>(parent: P) -> AgriResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("agri-scene-")
            .tempdir_in(parent)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Destination file for a downloaded band.
    pub fn band_path(&self, band: Band) -> PathBuf {
        self.dir.path().join(format!("{}.tif", band))
    }

    /// Total size of the files currently in the directory.
    pub fn usage_bytes(&self) -> u64 {
        std::fs::read_dir(self.dir.path())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| e.metadata().ok())
                    .filter(|m| m.is_file())
                    .map(|m| m.len())
                    .sum()
            })
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removed_on_drop() {
        let scratch = ScratchSpace::new().unwrap();
        let path = scratch.path().to_path_buf();
        std::fs::write(scratch.band_path(Band::Red), b"abcd").unwrap();
        assert_eq!(scratch.usage_bytes(), 4);
        assert!(path.exists());

        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn test_band_paths_are_distinct() {
        let scratch = ScratchSpace::new().unwrap();
        let mut names: Vec<_> = Band::ALL.iter().map(|b| scratch.band_path(*b)).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), 4);
        assert!(scratch.band_path(Band::Nir).ends_with("nir.tif"));
    }
}
