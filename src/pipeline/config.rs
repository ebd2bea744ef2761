// src/pipeline/config.rs

//! Run configuration
//!
//! Everything a run needs is carried explicitly in [`PipelineConfig`] and
//! handed down to each stage; there is no global state.

use crate::mode::BuildMode;
use crate::process::resolve_program;
use std::path::PathBuf;
use std::time::Duration;

/// Upper bound on the default number of concurrent acquisitions
pub const MAX_DEFAULT_JOBS: usize = 8;

/// Default manifest file name
pub const DEFAULT_MANIFEST: &str = "config.json";

/// Default working directory for acquired sources
pub const DEFAULT_WORKING_DIR: &str = "working";

/// External executables used by the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub git: PathBuf,
    /// 7-Zip compatible archiver
    pub archiver: PathBuf,
    pub cmake: PathBuf,
    /// Parser generator passed to CMake packages that need one
    pub bison: Option<PathBuf>,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            git: PathBuf::from("git"),
            archiver: PathBuf::from("7z"),
            cmake: PathBuf::from("cmake"),
            bison: None,
        }
    }
}

/// Availability of one external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub configured: PathBuf,
    /// Where it was found, if anywhere
    pub resolved: Option<PathBuf>,
}

impl ToolPaths {
    pub fn with_git(mut self, git: impl Into<PathBuf>) -> Self {
        self.git = git.into();
        self
    }

    pub fn with_archiver(mut self, archiver: impl Into<PathBuf>) -> Self {
        self.archiver = archiver.into();
        self
    }

    pub fn with_cmake(mut self, cmake: impl Into<PathBuf>) -> Self {
        self.cmake = cmake.into();
        self
    }

    pub fn with_bison(mut self, bison: Option<PathBuf>) -> Self {
        self.bison = bison;
        self
    }

    /// Look every tool up without running it
    pub fn check(&self) -> Vec<ToolStatus> {
        let bison = self.bison.clone().unwrap_or_else(|| PathBuf::from("bison"));
        [
            ("git", self.git.clone()),
            ("archiver", self.archiver.clone()),
            ("cmake", self.cmake.clone()),
            ("bison", bison),
        ]
        .into_iter()
        .map(|(name, configured)| ToolStatus {
            name,
            resolved: resolve_program(&configured),
            configured,
        })
        .collect()
    }
}

/// Default acquisition parallelism: available cores, capped
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .min(MAX_DEFAULT_JOBS)
}

/// Settings for one pipeline run
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub manifest_path: PathBuf,
    /// Where sources are acquired, one subdirectory per package
    pub working_dir: PathBuf,
    /// Directory the versioned LibPack directory is created in
    pub output_root: PathBuf,
    pub mode: BuildMode,
    /// Keep already-acquired package directories
    pub reuse_sources: bool,
    /// Skip packages already installed in an existing output directory
    pub skip_existing_builds: bool,
    pub jobs: usize,
    pub inhibit_sleep: bool,
    pub strip_components: bool,
    pub tools: ToolPaths,
    /// Limit on each external process; none by default
    pub timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            manifest_path: PathBuf::from(DEFAULT_MANIFEST),
            working_dir: PathBuf::from(DEFAULT_WORKING_DIR),
            output_root: PathBuf::from("."),
            mode: BuildMode::Release,
            reuse_sources: false,
            skip_existing_builds: false,
            jobs: default_jobs(),
            inhibit_sleep: true,
            strip_components: true,
            tools: ToolPaths::default(),
            timeout: None,
        }
    }
}

impl PipelineConfig {
    pub fn with_manifest(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = dir.into();
        self
    }

    pub fn with_output_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_root = dir.into();
        self
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_reuse_sources(mut self, reuse: bool) -> Self {
        self.reuse_sources = reuse;
        self
    }

    pub fn with_skip_existing_builds(mut self, skip: bool) -> Self {
        self.skip_existing_builds = skip;
        self
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn with_inhibit_sleep(mut self, inhibit: bool) -> Self {
        self.inhibit_sleep = inhibit;
        self
    }

    pub fn with_strip_components(mut self, strip: bool) -> Self {
        self.strip_components = strip;
        self
    }

    pub fn with_tools(mut self, tools: ToolPaths) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}
