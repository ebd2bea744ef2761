// src/patch/mod.rs

//! Patch engine
//!
//! A patch document holds one or more file-scoped patches, each introduced
//! by a delimiter line naming its target relative to the package root:
//!
//! ```text
//! @@@ src/zconf.h @@@
//! @@ -1,8 +1,6 @@
//! -The
//! +A
//!   End.
//! ```
//!
//! Application is strict. Every hunk's old text must be found verbatim; if
//! any hunk is missing the target file is left untouched and the patch
//! fails, because the vendor source no longer matches what the patch was
//! written against.

mod hunk;

pub use hunk::{Hunk, Op, apply_hunks, parse_hunks};

use crate::error::{Error, Result};
use crate::filesystem::safe_join;
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;
use tracing::{debug, info};

static DELIMITER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^@@@ (.+?) @@@\s*$").unwrap());

/// A patch body for one target file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Target path as written in the document
    pub file: String,
    pub body: String,
}

/// Split a patch document on its `@@@ <file> @@@` delimiters
///
/// Entries come back in document order. Non-blank text before the first
/// delimiter is an error.
pub fn split_patch_document(text: &str) -> Result<Vec<FilePatch>> {
    let mut patches: Vec<FilePatch> = Vec::new();

    for line in text.split_inclusive('\n') {
        let bare = line.trim_end_matches(['\n', '\r']);
        if let Some(caps) = DELIMITER_RE.captures(bare) {
            patches.push(FilePatch {
                file: caps[1].trim().to_string(),
                body: String::new(),
            });
            continue;
        }

        match patches.last_mut() {
            Some(current) => current.body.push_str(line),
            None if bare.trim().is_empty() => {}
            None => {
                return Err(Error::PatchParse(format!(
                    "expected '@@@ <file> @@@' before '{}'",
                    bare
                )));
            }
        }
    }

    Ok(patches)
}

/// Apply a patch body to text, naming `file` in any mismatch error
pub fn apply_to_text(text: &str, body: &str, file: &Path) -> Result<String> {
    let hunks = parse_hunks(body)?;
    apply_hunks(text, &hunks).map_err(|hunk| Error::PatchMismatch {
        file: file.to_path_buf(),
        hunk,
    })
}

/// Patch one file in place
///
/// The file is rewritten only if every hunk applies.
pub fn apply_patch(file: &Path, body: &str) -> Result<()> {
    let original = fs::read_to_string(file).map_err(|e| {
        Error::IoError(format!("Failed to read {} for patching: {}", file.display(), e))
    })?;

    let patched = apply_to_text(&original, body, file)?;
    fs::write(file, patched).map_err(|e| {
        Error::IoError(format!("Failed to write patched {}: {}", file.display(), e))
    })?;

    debug!("Patched {}", file.display());
    Ok(())
}

/// Apply every file-scoped patch in a document to files under `root`
///
/// Returns the number of files patched. Targets are resolved against
/// `root` and may not escape it.
pub fn apply_patch_document(root: &Path, document: &str) -> Result<usize> {
    let patches = split_patch_document(document)?;
    if patches.is_empty() {
        return Err(Error::PatchParse(
            "patch document names no files".to_string(),
        ));
    }

    for patch in &patches {
        // Documents written on Windows use backslash separators
        let relative = patch.file.replace('\\', "/");
        let target = safe_join(root, &relative)?;
        apply_patch(&target, &patch.body)?;
    }

    Ok(patches.len())
}

/// Read a patch document from disk and apply it under `root`
pub fn apply_patch_file(root: &Path, patch_file: &Path) -> Result<usize> {
    let document = fs::read_to_string(patch_file).map_err(|e| {
        Error::ConfigError(format!(
            "Failed to read patch {}: {}",
            patch_file.display(),
            e
        ))
    })?;

    let count = apply_patch_document(root, &document)?;
    info!(
        "Applied {} to {} file(s) in {}",
        patch_file.display(),
        count,
        root.display()
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const THE_END: &str = "@@ -1,8 +1,6 @@\n-The\n+A\n  End.\n";

    #[test]
    fn test_split_returns_one_entry_per_delimiter() {
        let doc = "@@@ a.txt @@@\n@@ -1,1 +1,1 @@\n-a\n+b\n@@@ dir/b.txt @@@\n@@ -1,1 +1,1 @@\n-c\n+d\n@@@ c.txt @@@\n";
        let patches = split_patch_document(doc).unwrap();
        assert_eq!(patches.len(), 3);
        assert_eq!(patches[0].file, "a.txt");
        assert_eq!(patches[0].body, "@@ -1,1 +1,1 @@\n-a\n+b\n");
        assert_eq!(patches[1].file, "dir/b.txt");
        assert_eq!(patches[1].body, "@@ -1,1 +1,1 @@\n-c\n+d\n");
        assert_eq!(patches[2].file, "c.txt");
        assert!(patches[2].body.is_empty());
    }

    #[test]
    fn test_split_allows_spaces_in_names() {
        let patches = split_patch_document("@@@ My File.txt @@@\r\nbody\r\n").unwrap();
        assert_eq!(patches[0].file, "My File.txt");
        assert_eq!(patches[0].body, "body\r\n");
    }

    #[test]
    fn test_split_rejects_leading_text() {
        assert!(split_patch_document("junk\n@@@ a.txt @@@\n").is_err());
        assert!(split_patch_document("\n\n@@@ a.txt @@@\n").is_ok());
    }

    #[test]
    fn test_apply_patch_writes_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("story.txt");
        fs::write(&file, "The End.").unwrap();

        apply_patch(&file, THE_END).unwrap();

        assert_eq!(fs::read_to_string(&file).unwrap(), "A End.");
    }

    #[test]
    fn test_mismatch_leaves_file_untouched() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("story.txt");
        fs::write(&file, "Some other text").unwrap();

        let err = apply_patch(&file, THE_END).unwrap_err();

        assert!(matches!(err, Error::PatchMismatch { hunk: 1, .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "Some other text");
    }

    #[test]
    fn test_apply_document_under_root() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("src")).unwrap();
        fs::write(temp.path().join("src/story.txt"), "The End.").unwrap();

        let doc = format!("@@@ src\\story.txt @@@\n{}", THE_END);
        let count = apply_patch_document(temp.path(), &doc).unwrap();

        assert_eq!(count, 1);
        assert_eq!(
            fs::read_to_string(temp.path().join("src/story.txt")).unwrap(),
            "A End."
        );
    }

    #[test]
    fn test_apply_document_rejects_traversal() {
        let temp = TempDir::new().unwrap();
        let doc = format!("@@@ ../escape.txt @@@\n{}", THE_END);
        assert!(matches!(
            apply_patch_document(temp.path(), &doc),
            Err(Error::PathTraversal(_))
        ));
    }

    #[test]
    fn test_apply_document_missing_target() {
        let temp = TempDir::new().unwrap();
        let doc = format!("@@@ missing.txt @@@\n{}", THE_END);
        assert!(apply_patch_document(temp.path(), &doc).is_err());
    }

    #[test]
    fn test_empty_document_is_error() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            apply_patch_document(temp.path(), "\n"),
            Err(Error::PatchParse(_))
        ));
    }
}
