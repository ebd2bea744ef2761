// src/sanitize/mod.rs

//! Artifact sanitizer
//!
//! Runs once over a finished LibPack to make it relocatable and free of
//! installer debris:
//!
//! 1. Delete a fixed list of scratch files from the tree root
//! 2. Rewrite absolute build-machine paths in CMake metadata
//! 3. Correct library references known to be wrong in specific files
//! 4. Optionally strip unused optional components and generated helper
//!    executables
//!
//! Everything here is best effort. Individual failures are logged and
//! collected in the [`SanitizeReport`]; only a missing tree is an error.

mod relocate;

pub use relocate::{
    KnownFix, PLACEHOLDER, create_depth_string, fix_known_references,
    remove_local_path_from_cmake_file, remove_local_path_from_cmake_files, rewrite_contents,
};

use crate::error::{Error, Result};
use crate::filesystem::remove_entry;
use crate::output::BIN_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Scratch files some vendor installers leave at the install root
pub const DEFAULT_DENYLIST: &[&str] = &[
    "custom_vc14_64.bat",
    "custom.bat",
    "USING_HDF5_CMake.txt",
    "USING_HDF5_VS.txt",
    "env.bat",
    "draw.bat",
    "RELEASE.txt",
];

/// What to remove and rewrite
#[derive(Debug, Clone)]
pub struct SanitizeConfig {
    /// File or directory names deleted from the tree root
    pub denylist: Vec<String>,
    /// File name suffix of build-metadata files to relocate
    pub metadata_extension: String,
    pub known_fixes: Vec<KnownFix>,
    /// Remove optional components matching `strip_markers`
    pub strip_components: bool,
    /// Case-insensitive name fragments of components to strip
    pub strip_markers: Vec<String>,
    /// Helper executables in `bin` start with this prefix...
    pub helper_prefix: String,
    /// ...and end with this suffix
    pub helper_suffix: String,
}

impl Default for SanitizeConfig {
    fn default() -> Self {
        Self {
            denylist: DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect(),
            metadata_extension: ".cmake".to_string(),
            known_fixes: KnownFix::defaults(),
            strip_components: true,
            strip_markers: vec!["webengine".to_string(), "qtpdf".to_string()],
            helper_prefix: "h5".to_string(),
            helper_suffix: ".exe".to_string(),
        }
    }
}

impl SanitizeConfig {
    pub fn with_strip_components(mut self, strip: bool) -> Self {
        self.strip_components = strip;
        self
    }
}

/// Summary of a sanitation pass
#[derive(Debug, Default)]
pub struct SanitizeReport {
    pub deleted: Vec<PathBuf>,
    pub rewritten: usize,
    pub fixed: usize,
    pub stripped: Vec<PathBuf>,
    /// Non-fatal failures, already logged
    pub errors: Vec<Error>,
}

/// Delete each denylisted name from `base`
///
/// Names that are not present are skipped. Returns what was deleted along
/// with any per-item failures.
pub fn delete_extraneous_files(base: &Path, denylist: &[String]) -> Result<(Vec<PathBuf>, Vec<Error>)> {
    check_tree(base)?;

    let mut deleted = Vec::new();
    let mut errors = Vec::new();
    for name in denylist {
        let path = base.join(name);
        if fs::symlink_metadata(&path).is_err() {
            debug!("{} not present", path.display());
            continue;
        }
        match remove_entry(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                deleted.push(path);
            }
            Err(e) => {
                let err = Error::SanitationError(format!("Cannot delete {}: {}", path.display(), e));
                warn!("{}", err);
                errors.push(err);
            }
        }
    }
    Ok((deleted, errors))
}

/// Delete every file or directory whose name contains one of `markers`
///
/// A matching directory is removed whole and not descended into.
pub fn strip_components(base: &Path, markers: &[String]) -> (Vec<PathBuf>, Vec<Error>) {
    let markers: Vec<String> = markers.iter().map(|m| m.to_lowercase()).collect();
    let mut matches = Vec::new();

    let mut walker = WalkDir::new(base).min_depth(1).into_iter();
    while let Some(entry) = walker.next() {
        let Ok(entry) = entry else { continue };
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if markers.iter().any(|m| name.contains(m.as_str())) {
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            matches.push(entry.into_path());
        }
    }

    remove_all(matches)
}

/// Delete generated helper executables from `<base>/bin`
pub fn remove_helper_executables(base: &Path, prefix: &str, suffix: &str) -> (Vec<PathBuf>, Vec<Error>) {
    let bin = base.join(BIN_DIR);
    let Ok(entries) = fs::read_dir(&bin) else {
        return (Vec::new(), Vec::new());
    };

    let prefix = prefix.to_lowercase();
    let suffix = suffix.to_lowercase();
    let matches: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| {
            let name = e.file_name().to_string_lossy().to_lowercase();
            name.starts_with(&prefix) && name.ends_with(&suffix)
        })
        .map(|e| e.path())
        .collect();

    remove_all(matches)
}

fn remove_all(paths: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<Error>) {
    let mut removed = Vec::new();
    let mut errors = Vec::new();
    for path in paths {
        match remove_entry(&path) {
            Ok(()) => removed.push(path),
            Err(e) => {
                let err = Error::SanitationError(format!("Cannot delete {}: {}", path.display(), e));
                warn!("{}", err);
                errors.push(err);
            }
        }
    }
    (removed, errors)
}

fn check_tree(base: &Path) -> Result<()> {
    if !base.exists() {
        return Err(Error::SanitationError(format!("{} does not exist", base.display())));
    }
    if !base.is_dir() {
        return Err(Error::SanitationError(format!("{} is not a directory", base.display())));
    }
    Ok(())
}

/// Runs the whole sanitation pass
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    config: SanitizeConfig,
}

impl Sanitizer {
    pub fn new(config: SanitizeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SanitizeConfig {
        &self.config
    }

    /// Sanitize the tree at `base`
    ///
    /// Fails only when `base` is not a directory.
    pub fn run(&self, base: &Path) -> Result<SanitizeReport> {
        check_tree(base)?;
        let base = std::path::absolute(base)?;
        info!("Sanitizing {}", base.display());

        let mut report = SanitizeReport::default();

        let (deleted, errors) = delete_extraneous_files(&base, &self.config.denylist)?;
        report.deleted = deleted;
        report.errors.extend(errors);

        if self.config.strip_components {
            let (stripped, errors) = strip_components(&base, &self.config.strip_markers);
            report.stripped.extend(stripped);
            report.errors.extend(errors);

            let (helpers, errors) = remove_helper_executables(
                &base,
                &self.config.helper_prefix,
                &self.config.helper_suffix,
            );
            report.stripped.extend(helpers);
            report.errors.extend(errors);
        }

        let (rewritten, errors) =
            remove_local_path_from_cmake_files(&base, &self.config.metadata_extension);
        report.rewritten = rewritten;
        report.errors.extend(errors);

        let (fixed, errors) = fix_known_references(&base, &self.config.known_fixes);
        report.fixed = fixed;
        report.errors.extend(errors);

        info!(
            "Sanitation done: {} deleted, {} stripped, {} metadata files rewritten, {} fixed, {} problems",
            report.deleted.len(),
            report.stripped.len(),
            report.rewritten,
            report.fixed,
            report.errors.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_delete_extraneous_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("env.bat"), "").unwrap();
        fs::write(temp.path().join("RELEASE.txt"), "").unwrap();
        fs::write(temp.path().join("keep.txt"), "").unwrap();
        let denylist: Vec<String> = DEFAULT_DENYLIST.iter().map(|s| s.to_string()).collect();

        let (deleted, errors) = delete_extraneous_files(temp.path(), &denylist).unwrap();

        assert_eq!(deleted.len(), 2);
        assert!(errors.is_empty());
        assert!(temp.path().join("keep.txt").exists());
        assert!(!temp.path().join("env.bat").exists());

        // Running again finds nothing to do
        let (deleted, errors) = delete_extraneous_files(temp.path(), &denylist).unwrap();
        assert!(deleted.is_empty());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_delete_requires_directory() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("file");
        fs::write(&file, "").unwrap();
        assert!(delete_extraneous_files(&temp.path().join("missing"), &[]).is_err());
        assert!(delete_extraneous_files(&file, &[]).is_err());
    }

    #[test]
    fn test_strip_components_case_insensitive() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        fs::create_dir_all(base.join("lib/cmake/Qt6WebEngineCore")).unwrap();
        fs::write(base.join("lib/cmake/Qt6WebEngineCore/x.cmake"), "").unwrap();
        fs::create_dir_all(base.join("bin")).unwrap();
        fs::write(base.join("bin/QtPdfQuick.dll"), "").unwrap();
        fs::write(base.join("bin/Qt6Core.dll"), "").unwrap();

        let markers = vec!["webengine".to_string(), "qtpdf".to_string()];
        let (removed, errors) = strip_components(base, &markers);

        assert!(errors.is_empty());
        assert_eq!(removed.len(), 2);
        assert!(!base.join("lib/cmake/Qt6WebEngineCore").exists());
        assert!(!base.join("bin/QtPdfQuick.dll").exists());
        assert!(base.join("bin/Qt6Core.dll").exists());
    }

    #[test]
    fn test_remove_helper_executables() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        fs::create_dir_all(&bin).unwrap();
        for name in ["h5dump.exe", "h5ls.exe", "hdf5.dll", "python.exe", "h5cc"] {
            fs::write(bin.join(name), "").unwrap();
        }

        let (removed, _) = remove_helper_executables(temp.path(), "h5", ".exe");

        assert_eq!(removed.len(), 2);
        assert!(bin.join("hdf5.dll").exists());
        assert!(bin.join("python.exe").exists());
        assert!(bin.join("h5cc").exists());
    }

    #[test]
    fn test_sanitizer_run() {
        let temp = TempDir::new().unwrap();
        let base = temp.path().join("LibPack-1.0.0-v3.0.0-Release");
        let cmake_dir = base.join("lib/cmake/zlib");
        fs::create_dir_all(&cmake_dir).unwrap();
        fs::create_dir_all(base.join("bin")).unwrap();
        fs::write(base.join("custom.bat"), "").unwrap();
        fs::write(base.join("bin/h5dump.exe"), "").unwrap();
        let absolute = std::path::absolute(&base).unwrap();
        fs::write(
            cmake_dir.join("zlib-config.cmake"),
            format!("set(ZLIB_INCLUDE \"{}/include\")\n", absolute.display()),
        )
        .unwrap();

        let report = Sanitizer::default().run(&base).unwrap();

        assert_eq!(report.deleted.len(), 1);
        assert_eq!(report.stripped.len(), 1);
        assert_eq!(report.rewritten, 1);
        assert!(report.errors.is_empty());
        assert_eq!(
            fs::read_to_string(cmake_dir.join("zlib-config.cmake")).unwrap(),
            "set(ZLIB_INCLUDE \"${CMAKE_CURRENT_SOURCE_DIR}/../../../include\")\n"
        );
    }

    #[test]
    fn test_sanitizer_keeps_components_when_disabled() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("bin")).unwrap();
        fs::write(temp.path().join("bin/h5dump.exe"), "").unwrap();
        fs::create_dir_all(temp.path().join("qtwebengine")).unwrap();

        let config = SanitizeConfig::default().with_strip_components(false);
        let report = Sanitizer::new(config).run(temp.path()).unwrap();

        assert!(report.stripped.is_empty());
        assert!(temp.path().join("bin/h5dump.exe").exists());
        assert!(temp.path().join("qtwebengine").exists());
    }
}
