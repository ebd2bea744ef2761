// src/sanitize/relocate.rs

//! Rewriting absolute build-machine paths in CMake metadata
//!
//! Installed `*.cmake` files often embed the absolute path of the LibPack
//! as it was on the build machine. Each occurrence is replaced by
//! `${CMAKE_CURRENT_SOURCE_DIR}` followed by enough `../` segments to climb
//! from the file's directory back to the LibPack root.

use crate::error::{Error, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Placeholder that CMake resolves to the directory of the file being read
pub const PLACEHOLDER: &str = "${CMAKE_CURRENT_SOURCE_DIR}";

fn components(path: &str) -> Vec<&str> {
    path.split(['/', '\\']).filter(|c| !c.is_empty()).collect()
}

/// `../` repeated once per directory between `file`'s directory and `base`
///
/// Both separators are accepted in either argument, and trailing or doubled
/// separators are ignored. The result always uses forward slashes.
///
/// ```
/// use libpack::sanitize::create_depth_string;
///
/// let depth = create_depth_string("Z:\\X\\Y\\", "Z:\\X\\Y\\lib\\cmake\\mock.cmake").unwrap();
/// assert_eq!(depth, "../../");
/// ```
pub fn create_depth_string(base: &str, file: &str) -> Result<String> {
    let base_parts = components(base);
    let file_parts = components(file);

    if file_parts.len() <= base_parts.len() || !file_parts.starts_with(&base_parts) {
        return Err(Error::SanitationError(format!(
            "{} does not appear to be in {}",
            file, base
        )));
    }

    // The last component is the file itself
    let steps_up = file_parts.len() - 1 - base_parts.len();
    Ok("../".repeat(steps_up))
}

/// Spellings of `base` that may appear in generated files
fn base_variants(base: &str) -> Vec<String> {
    let trimmed = base.trim_end_matches(['/', '\\']);
    let mut variants = vec![
        trimmed.to_string(),
        trimmed.replace('\\', "/"),
        trimmed.replace('/', "\\"),
    ];
    variants.sort();
    variants.dedup();
    variants.retain(|v| !v.is_empty());
    variants
}

fn is_name_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn replace_base(text: &str, variant: &str, relative: &str, bare: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find(variant) {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + variant.len()..];
        match after.chars().next() {
            Some('/') | Some('\\') => {
                out.push_str(relative);
                rest = &after[1..];
            }
            // A longer directory name that merely starts with the base
            Some(c) if is_name_char(c) => {
                out.push_str(variant);
                rest = after;
            }
            _ => {
                out.push_str(bare);
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Replace every occurrence of `base` in `contents` with the placeholder plus `depth`
///
/// A base followed by a separator keeps the rest of the path after it; a
/// bare base (for example a quoted prefix) becomes the placeholder plus
/// the depth without its trailing slash.
pub fn rewrite_contents(contents: &str, base: &str, depth: &str) -> String {
    let relative = format!("{}/{}", PLACEHOLDER, depth);
    let bare = relative.trim_end_matches('/').to_string();

    base_variants(base)
        .iter()
        .fold(contents.to_string(), |text, variant| {
            replace_base(&text, variant, &relative, &bare)
        })
}

/// Rewrite one file in place; returns whether its contents changed
pub fn remove_local_path_from_cmake_file(base: &str, file: &Path) -> Result<bool> {
    let depth = create_depth_string(base, &file.display().to_string())?;
    let contents = fs::read_to_string(file).map_err(|e| {
        Error::SanitationError(format!("Cannot read {}: {}", file.display(), e))
    })?;

    let cleaned = rewrite_contents(&contents, base, &depth);
    if cleaned == contents {
        return Ok(false);
    }

    fs::write(file, cleaned).map_err(|e| {
        Error::SanitationError(format!("Cannot write {}: {}", file.display(), e))
    })?;
    debug!("Removed local paths from {}", file.display());
    Ok(true)
}

fn has_extension(path: &Path, extension: &str) -> bool {
    path.file_name()
        .map(|n| n.to_string_lossy().to_lowercase().ends_with(&extension.to_lowercase()))
        .unwrap_or(false)
}

/// Rewrite every metadata file under `base` whose name ends in `extension`
///
/// Failures on individual files are logged and collected, never fatal.
/// Returns the number of files changed and the per-file errors.
pub fn remove_local_path_from_cmake_files(base: &Path, extension: &str) -> (usize, Vec<Error>) {
    let base_text = base.display().to_string();
    let mut changed = 0;
    let mut errors = Vec::new();

    for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() || !has_extension(entry.path(), extension) {
            continue;
        }
        match remove_local_path_from_cmake_file(&base_text, entry.path()) {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => {
                warn!("{}", e);
                errors.push(e);
            }
        }
    }

    (changed, errors)
}

/// A literal correction applied to files with a given name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownFix {
    pub file_name: String,
    pub find: String,
    pub replace: String,
}

impl KnownFix {
    pub fn new(file_name: &str, find: &str, replace: &str) -> Self {
        Self {
            file_name: file_name.to_string(),
            find: find.to_string(),
            replace: replace.to_string(),
        }
    }

    /// Corrections for library references that generic rewriting cannot catch
    pub fn defaults() -> Vec<Self> {
        ["release", "debug"]
            .iter()
            .map(|variant| {
                Self::new(
                    &format!("OpenCASCADEVisualizationTargets-{}.cmake", variant),
                    "\"freetype.lib\"",
                    "\"${_IMPORT_PREFIX}/lib/freetype.lib\"",
                )
            })
            .collect()
    }
}

/// Apply `fixes` to every matching file under `base`
///
/// Returns the number of files changed and the per-file errors.
pub fn fix_known_references(base: &Path, fixes: &[KnownFix]) -> (usize, Vec<Error>) {
    let mut changed = 0;
    let mut errors = Vec::new();

    for entry in WalkDir::new(base).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        for fix in fixes.iter().filter(|f| f.file_name == name) {
            let path = entry.path();
            let result = fs::read_to_string(path).and_then(|contents| {
                if contents.contains(&fix.find) {
                    fs::write(path, contents.replace(&fix.find, &fix.replace))?;
                    Ok(true)
                } else {
                    Ok(false)
                }
            });
            match result {
                Ok(true) => {
                    debug!("Fixed {} in {}", fix.find, path.display());
                    changed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    let err = Error::SanitationError(format!("Cannot fix {}: {}", path.display(), e));
                    warn!("{}", err);
                    errors.push(err);
                }
            }
        }
    }

    (changed, errors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_depth_string_simple() {
        assert_eq!(
            create_depth_string("some/fake/path", "some/fake/path/to/a/file.txt").unwrap(),
            "../../"
        );
    }

    #[test]
    fn test_depth_string_trailing_separator() {
        assert_eq!(
            create_depth_string("some/fake/path/", "some/fake/path/to/a/file.txt").unwrap(),
            "../../"
        );
        assert_eq!(
            create_depth_string("Z:\\X\\Y\\", "Z:\\X\\Y\\lib\\cmake\\mock.cmake").unwrap(),
            "../../"
        );
        assert_eq!(
            create_depth_string("Z:\\X\\Y", "Z:\\X\\Y\\lib\\cmake\\mock.cmake").unwrap(),
            "../../"
        );
    }

    #[test]
    fn test_depth_string_doubled_separators() {
        assert_eq!(
            create_depth_string("some/fake/path", "some//fake//path//to//a//file.txt").unwrap(),
            "../../"
        );
        assert_eq!(
            create_depth_string("Z:\\X\\Y\\", "Z:\\\\X\\\\Y\\\\lib\\\\cmake\\\\mock.cmake").unwrap(),
            "../../"
        );
    }

    #[test]
    fn test_depth_string_file_at_root() {
        assert_eq!(create_depth_string("/opt/lp", "/opt/lp/x.cmake").unwrap(), "");
    }

    #[test]
    fn test_depth_string_outside_base() {
        assert!(create_depth_string("/opt/lp", "/opt/other/x.cmake").is_err());
        assert!(create_depth_string("/opt/lp", "/opt/lp").is_err());
    }

    #[test]
    fn test_rewrite_forward_slash_reference() {
        let data = "    set(_BOOST_CMAKEDIR \"Z:/FreeCAD/FreeCAD-LibPack-1.0.0-v3.0.0-Release/lib/cmake\")\n";
        let cleaned = rewrite_contents(data, "Z:\\FreeCAD\\FreeCAD-LibPack-1.0.0-v3.0.0-Release\\", "../../");
        assert_eq!(
            cleaned,
            "    set(_BOOST_CMAKEDIR \"${CMAKE_CURRENT_SOURCE_DIR}/../../lib/cmake\")\n"
        );
    }

    #[test]
    fn test_rewrite_mixed_separator_reference() {
        let data = "SET(_hdf5_path \"Z:\\FreeCAD\\FreeCAD-LibPack-1.0.0-v3.0.0-Release/share/cmake/\")\n";
        let cleaned = rewrite_contents(data, "Z:\\FreeCAD\\FreeCAD-LibPack-1.0.0-v3.0.0-Release\\", "../../");
        assert_eq!(
            cleaned,
            "SET(_hdf5_path \"${CMAKE_CURRENT_SOURCE_DIR}/../../share/cmake/\")\n"
        );
    }

    #[test]
    fn test_rewrite_bare_prefix() {
        let data = "set(PREFIX \"/opt/lp\")\n";
        assert_eq!(
            rewrite_contents(data, "/opt/lp", "../../"),
            "set(PREFIX \"${CMAKE_CURRENT_SOURCE_DIR}/../..\")\n"
        );
        assert_eq!(
            rewrite_contents(data, "/opt/lp", ""),
            "set(PREFIX \"${CMAKE_CURRENT_SOURCE_DIR}\")\n"
        );
    }

    #[test]
    fn test_rewrite_ignores_longer_names() {
        let data = "/opt/lp-backup-a/lib;/opt/lp/lib";
        assert_eq!(
            rewrite_contents(data, "/opt/lp", "../"),
            "/opt/lp-backup-a/lib;${CMAKE_CURRENT_SOURCE_DIR}/../lib"
        );
    }

    #[test]
    fn test_rewrite_is_idempotent() {
        let data = "a Z:/LP/lib b Z:\\LP\\include c Z:/LP\n";
        let once = rewrite_contents(data, "Z:\\LP", "../");
        let twice = rewrite_contents(&once, "Z:\\LP", "../");
        assert_eq!(once, twice);
        assert!(!once.contains("Z:"));
    }

    #[test]
    fn test_rewrite_files_in_tree() {
        let temp = TempDir::new().unwrap();
        let base = temp.path();
        let dir = base.join("lib").join("cmake").join("Boost");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("BoostConfig.cmake");
        fs::write(&file, format!("set(DIR \"{}/include\")\n", base.display())).unwrap();
        fs::write(dir.join("notes.txt"), base.display().to_string()).unwrap();

        let (changed, errors) = remove_local_path_from_cmake_files(base, ".cmake");

        assert_eq!(changed, 1);
        assert!(errors.is_empty());
        assert_eq!(
            fs::read_to_string(&file).unwrap(),
            "set(DIR \"${CMAKE_CURRENT_SOURCE_DIR}/../../../include\")\n"
        );
        // Other files are not touched
        assert_eq!(
            fs::read_to_string(dir.join("notes.txt")).unwrap(),
            base.display().to_string()
        );

        let (changed_again, _) = remove_local_path_from_cmake_files(base, ".cmake");
        assert_eq!(changed_again, 0);
    }

    #[test]
    fn test_known_fix_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("cmake");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("OpenCASCADEVisualizationTargets-release.cmake");
        fs::write(&file, "INTERFACE_LINK_LIBRARIES \"freetype.lib\"\n").unwrap();

        let fixes = KnownFix::defaults();
        let (changed, errors) = fix_known_references(temp.path(), &fixes);
        assert_eq!(changed, 1);
        assert!(errors.is_empty());
        let fixed = fs::read_to_string(&file).unwrap();
        assert_eq!(
            fixed,
            "INTERFACE_LINK_LIBRARIES \"${_IMPORT_PREFIX}/lib/freetype.lib\"\n"
        );

        let (changed, _) = fix_known_references(temp.path(), &fixes);
        assert_eq!(changed, 0);
        assert_eq!(fs::read_to_string(&file).unwrap(), fixed);
    }
}
