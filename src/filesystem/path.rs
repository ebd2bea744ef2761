// src/filesystem/path.rs

//! Path checks for names and archive members that come from outside the
//! process (manifest entries, patch documents, tarballs)

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Normalize an untrusted relative path
///
/// `.` components and leading separators are dropped; any `..` component is
/// rejected. An empty result is an error.
///
/// ```
/// use libpack::filesystem::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("src/zconf.h").unwrap(), PathBuf::from("src/zconf.h"));
/// assert_eq!(sanitize_path("/./src/zconf.h").unwrap(), PathBuf::from("src/zconf.h"));
/// assert!(sanitize_path("src/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let text = path.to_string_lossy();
    let relative = text.trim_start_matches(['/', '\\']);

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::Prefix(_) | Component::RootDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(text.to_string())),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!("'{}' is empty after normalization", text)));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root` without escaping it
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path.as_ref())?);

    // Symlinks inside the root can still point outside of it
    if let (Ok(canonical_root), Ok(canonical_joined)) = (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "{} escapes {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Check that a package name can be used as a single directory name
pub fn check_dir_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidPath("empty directory name".to_string()));
    }
    if name == "." || name == ".." {
        return Err(Error::PathTraversal(name.to_string()));
    }
    if name.contains(['/', '\\']) {
        return Err(Error::PathTraversal(format!(
            "'{}' contains a path separator",
            name
        )));
    }
    if name.contains([':', '*', '?', '"', '<', '>', '|', '\0']) {
        return Err(Error::InvalidPath(format!(
            "'{}' contains characters that are not valid in a directory name",
            name
        )));
    }
    Ok(())
}
