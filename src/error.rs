// src/error.rs

//! Error types for the LibPack builder
//!
//! Every variant maps onto one of the failure classes of a run:
//! configuration, acquisition, patching, building, output rotation and
//! sanitation. Only sanitation failures are recoverable; the pipeline logs
//! them and carries on.

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced by the LibPack pipeline
#[derive(Debug, Error)]
pub enum Error {
    /// Bad or missing manifest, invalid option values
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Manifest entry names a package with no build procedure
    #[error("No build procedure for package '{0}'")]
    UnknownPackage(String),

    #[error("Failed to clone {url}{}: {output}", .reference.as_deref().map(|r| format!(" at {r}")).unwrap_or_default())]
    CloneFailed {
        url: String,
        reference: Option<String>,
        output: String,
    },

    #[error("Failed to download {url}: {reason}")]
    DownloadFailed { url: String, reason: String },

    #[error("Failed to decompress {name}: {reason}")]
    DecompressFailed { name: String, reason: String },

    /// Malformed patch document or hunk
    #[error("Invalid patch: {0}")]
    PatchParse(String),

    /// A hunk's old text is not present in the target file
    #[error("Patch does not apply to {}: hunk {hunk} not found (source has drifted)", .file.display())]
    PatchMismatch { file: PathBuf, hunk: usize },

    #[error("Build of {package} failed{}:\n{output}", .exit_code.map(|c| format!(" with exit code {c}")).unwrap_or_default())]
    BuildFailed {
        package: String,
        exit_code: Option<i32>,
        output: String,
    },

    /// All 26 backup slots for an output directory are taken
    #[error("Too many old LibPack backup directories for {}; delete some of them", .0.display())]
    BackupExhausted(PathBuf),

    #[error("External tool {program} could not be run: {reason}")]
    ToolFailed { program: String, reason: String },

    #[error("{program} timed out after {seconds} seconds")]
    Timeout { program: String, seconds: u64 },

    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Best-effort cleanup failure; logged, never fatal
    #[error("Sanitation error: {0}")]
    SanitationError(String),

    #[error("I/O error: {0}")]
    IoError(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this error must abort the run
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::SanitationError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_failed_display() {
        let err = Error::CloneFailed {
            url: "https://example.com/repo.git".to_string(),
            reference: Some("v1.0".to_string()),
            output: "fatal: not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("https://example.com/repo.git"));
        assert!(msg.contains("at v1.0"));
        assert!(msg.contains("fatal: not found"));

        let err = Error::CloneFailed {
            url: "https://example.com/repo.git".to_string(),
            reference: None,
            output: String::new(),
        };
        assert!(!err.to_string().contains(" at "));
    }

    #[test]
    fn test_build_failed_display() {
        let err = Error::BuildFailed {
            package: "boost".to_string(),
            exit_code: Some(2),
            output: "b2: error".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("boost"));
        assert!(msg.contains("exit code 2"));
        assert!(msg.contains("b2: error"));
    }

    #[test]
    fn test_only_sanitation_is_non_fatal() {
        assert!(!Error::SanitationError("x".to_string()).is_fatal());
        assert!(Error::UnknownPackage("x".to_string()).is_fatal());
        assert!(Error::BackupExhausted(PathBuf::from("/tmp/x")).is_fatal());
    }
}
