// src/output.rs

//! Output directory naming and backup rotation
//!
//! A LibPack is built into `LibPack-<product>-v<libpack>-<Mode>` under the
//! output root. If that directory already exists it is renamed out of the
//! way to `<name>-backup-a`, `-b`, ... `-z`; nothing is ever deleted here.

use crate::error::{Error, Result};
use crate::mode::BuildMode;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the binaries subdirectory created in every fresh output directory
pub const BIN_DIR: &str = "bin";

/// Directory name for a given version triple
pub fn dir_name(product_version: &str, libpack_version: &str, mode: BuildMode) -> String {
    format!("LibPack-{}-v{}-{}", product_version, libpack_version, mode)
}

/// Canonical output path under `root`; performs no I/O
pub fn resolve_path(
    root: &Path,
    product_version: &str,
    libpack_version: &str,
    mode: BuildMode,
) -> PathBuf {
    root.join(dir_name(product_version, libpack_version, mode))
}

/// First backup name not present on disk, or `None` when `a`..`z` are all taken
pub fn next_backup_path(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_string_lossy().into_owned();
    ('a'..='z')
        .map(|letter| path.with_file_name(format!("{}-backup-{}", name, letter)))
        .find(|candidate| !candidate.exists())
}

/// Get an output directory ready for a run
///
/// With `reuse_if_exists`, an existing directory is returned untouched so an
/// interrupted run can continue. Otherwise an existing directory is rotated
/// into the first free backup slot before a fresh one (with a `bin`
/// subdirectory) is created.
pub fn prepare(path: &Path, reuse_if_exists: bool) -> Result<PathBuf> {
    if path.exists() {
        if reuse_if_exists {
            info!("Reusing existing output directory {}", path.display());
            return Ok(path.to_path_buf());
        }

        let backup = next_backup_path(path).ok_or_else(|| Error::BackupExhausted(path.to_path_buf()))?;
        fs::rename(path, &backup).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {}",
                path.display(),
                backup.display(),
                e
            ))
        })?;
        info!("Moved previous {} to {}", path.display(), backup.display());
    }

    fs::create_dir_all(path.join(BIN_DIR)).map_err(|e| {
        Error::IoError(format!("Failed to create {}: {}", path.display(), e))
    })?;
    debug!("Created output directory {}", path.display());

    Ok(path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn count_entries(dir: &Path) -> usize {
        fs::read_dir(dir).unwrap().count()
    }

    #[test]
    fn test_dir_name_contains_versions_and_mode() {
        let name = dir_name("0.22", "3.0.0", BuildMode::Release);
        assert_eq!(name, "LibPack-0.22-v3.0.0-Release");
        assert_eq!(
            dir_name("1.0.0", "3.1.0", BuildMode::Debug),
            "LibPack-1.0.0-v3.1.0-Debug"
        );
    }

    #[test]
    fn test_resolve_path_is_pure() {
        let root = Path::new("/does/not/exist");
        let a = resolve_path(root, "1.0", "2.0", BuildMode::Debug);
        let b = resolve_path(root, "1.0", "2.0", BuildMode::Debug);
        assert_eq!(a, b);
        assert!(!root.exists());
        assert_ne!(a, resolve_path(root, "1.0", "2.0", BuildMode::Release));
    }

    #[test]
    fn test_prepare_fresh_creates_one_dir() {
        let temp = TempDir::new().unwrap();
        let path = resolve_path(temp.path(), "0.22", "3.0.0", BuildMode::Release);

        let prepared = prepare(&path, false).unwrap();

        assert_eq!(prepared, path);
        assert_eq!(count_entries(temp.path()), 1);
        assert!(path.join(BIN_DIR).is_dir());
    }

    #[test]
    fn test_prepare_rotates_existing() {
        let temp = TempDir::new().unwrap();
        let path = resolve_path(temp.path(), "0.22", "3.0.0", BuildMode::Release);
        prepare(&path, false).unwrap();
        fs::write(path.join("marker.txt"), "first").unwrap();

        prepare(&path, false).unwrap();

        assert_eq!(count_entries(temp.path()), 2);
        let backup = temp.path().join("LibPack-0.22-v3.0.0-Release-backup-a");
        assert_eq!(fs::read_to_string(backup.join("marker.txt")).unwrap(), "first");
        assert!(!path.join("marker.txt").exists());
    }

    #[test]
    fn test_prepare_reuse_keeps_contents() {
        let temp = TempDir::new().unwrap();
        let path = resolve_path(temp.path(), "0.22", "3.0.0", BuildMode::Debug);
        prepare(&path, false).unwrap();
        fs::write(path.join("marker.txt"), "keep").unwrap();

        prepare(&path, true).unwrap();

        assert_eq!(count_entries(temp.path()), 1);
        assert!(path.join("marker.txt").exists());
    }

    #[test]
    fn test_backup_slots_exhaust() {
        let temp = TempDir::new().unwrap();
        let path = resolve_path(temp.path(), "0.22", "3.0.0", BuildMode::Release);

        // One fresh directory plus 26 backups
        for k in 1..=27 {
            prepare(&path, false).unwrap();
            assert_eq!(count_entries(temp.path()), k);
        }

        let err = prepare(&path, false).unwrap_err();
        assert!(matches!(err, Error::BackupExhausted(_)));
        assert_eq!(count_entries(temp.path()), 27);
        assert!(path.exists());
    }
}
