// src/lib.rs

//! LibPack builder
//!
//! Assembles a versioned bundle of precompiled third-party libraries (a
//! "LibPack") from a declarative manifest.
//!
//! # Architecture
//!
//! - Manifest: JSON list of packages with their source, patches and options
//! - Acquisition: git clones and direct downloads, fetched in parallel into
//!   disjoint working directories
//! - Build: a closed registry of per-package procedures run in manifest order
//! - Sanitation: relocatable CMake metadata, no installer debris
//! - External tools run behind the `ToolRunner` seam with explicit paths;
//!   the process working directory is never changed

pub mod acquire;
pub mod build;
mod error;
pub mod filesystem;
pub mod inhibit;
pub mod manifest;
pub mod mode;
pub mod output;
pub mod patch;
pub mod pipeline;
pub mod process;
pub mod sanitize;

pub use build::{BuildProcedure, BuildRegistry, PackageOutcome};
pub use error::{Error, Result};
pub use manifest::{Acquisition, HostArch, Manifest, PackageEntry};
pub use mode::BuildMode;
pub use pipeline::{Pipeline, PipelineConfig, PipelineReport, ToolPaths};
pub use process::{Invocation, RecordingRunner, SystemRunner, ToolOutput, ToolRunner};
pub use sanitize::{SanitizeConfig, SanitizeReport, Sanitizer};
