// src/cli/mod.rs

//! CLI definitions for the LibPack builder
//!
//! This module contains the command-line interface definitions using clap.
//! The command implementations are in the `commands` module.
//!
//! - `build` - Acquire, build and sanitize a full LibPack
//! - `init` - Prepare the output directory only
//! - `sanitize` - Clean up an existing LibPack tree
//! - `patch` - Apply one patch document to a source tree
//! - `check` - Report which external tools can be found

use clap::{Parser, Subcommand, ValueEnum};
use libpack::BuildMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "libpack")]
#[command(author = "LibPack Contributors")]
#[command(version)]
#[command(about = "Build a bundle of precompiled third-party libraries from a manifest", long_about = None)]
pub struct Cli {
    /// Enable debug logging (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Compiler configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModeArg {
    Debug,
    Release,
}

impl From<ModeArg> for BuildMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Debug => BuildMode::Debug,
            ModeArg::Release => BuildMode::Release,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Acquire, build and sanitize every package in the manifest
    ///
    /// Only one run may target an output directory at a time; no lock is
    /// taken, so do not start two builds with the same versions and mode.
    Build {
        /// Directory the LibPack directory is created in
        #[arg(default_value = ".")]
        output_root: PathBuf,

        /// Build mode
        #[arg(short, long, value_enum, default_value = "release")]
        mode: ModeArg,

        /// Path to the manifest
        #[arg(short, long, default_value = libpack::pipeline::DEFAULT_MANIFEST)]
        config: PathBuf,

        /// Directory sources are acquired into
        #[arg(short, long, default_value = libpack::pipeline::DEFAULT_WORKING_DIR)]
        working: PathBuf,

        /// Keep the working directory and reuse packages already acquired
        #[arg(short = 'e', long)]
        skip_existing_clone: bool,

        /// Reuse the output directory and skip packages already installed
        #[arg(short = 'b', long)]
        skip_existing_build: bool,

        /// Do not ask before deleting the working directory
        #[arg(short, long)]
        silent: bool,

        /// 7-Zip compatible archiver
        #[arg(long, default_value = "7z")]
        archiver: PathBuf,

        /// Parser generator handed to packages that need one
        #[arg(long)]
        bison: Option<PathBuf>,

        /// CMake executable
        #[arg(long, default_value = "cmake")]
        cmake: PathBuf,

        /// Git executable
        #[arg(long, default_value = "git")]
        git: PathBuf,

        /// Maximum concurrent acquisitions (default: available cores, at most 8)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Kill any external tool running longer than this many seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Let the machine sleep during the build
        #[arg(long)]
        no_inhibit: bool,

        /// Keep optional components that are normally stripped
        #[arg(long)]
        keep_components: bool,
    },

    /// Create the output directory only, rotating any existing one
    ///
    /// Use this to drop a pre-built Python into `bin` before building.
    Init {
        /// Directory the LibPack directory is created in
        #[arg(default_value = ".")]
        output_root: PathBuf,

        /// Build mode
        #[arg(short, long, value_enum, default_value = "release")]
        mode: ModeArg,

        /// Path to the manifest
        #[arg(short, long, default_value = libpack::pipeline::DEFAULT_MANIFEST)]
        config: PathBuf,
    },

    /// Make an existing LibPack relocatable and remove installer debris
    Sanitize {
        /// LibPack directory
        dir: PathBuf,

        /// Keep optional components that are normally stripped
        #[arg(long)]
        keep_components: bool,
    },

    /// Apply a patch document to a source tree
    Patch {
        /// Patch document
        patch_file: PathBuf,

        /// Directory the patched file names are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
    },

    /// Report which external tools can be found
    Check {
        /// 7-Zip compatible archiver
        #[arg(long, default_value = "7z")]
        archiver: PathBuf,

        /// Parser generator
        #[arg(long)]
        bison: Option<PathBuf>,

        /// CMake executable
        #[arg(long, default_value = "cmake")]
        cmake: PathBuf,

        /// Git executable
        #[arg(long, default_value = "git")]
        git: PathBuf,
    },
}
