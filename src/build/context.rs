// src/build/context.rs

//! Shared state handed to every build procedure

use crate::error::{Error, Result};
use crate::manifest::HostArch;
use crate::mode::BuildMode;
use crate::pipeline::ToolPaths;
use crate::process::{Invocation, ToolOutput, ToolRunner};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Operating system family a LibPack is built for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOs {
    Windows,
    Unix,
}

impl TargetOs {
    pub fn host() -> Self {
        if cfg!(windows) { Self::Windows } else { Self::Unix }
    }

    /// Append the platform executable suffix to `name`
    pub fn exe(&self, name: &str) -> String {
        match self {
            Self::Windows => format!("{}.exe", name),
            Self::Unix => name.to_string(),
        }
    }
}

/// Everything a procedure needs to build one package
pub struct BuildContext<'a> {
    pub mode: BuildMode,
    /// Root of the LibPack being assembled
    pub install_dir: PathBuf,
    /// The package's acquired source tree
    pub source_dir: PathBuf,
    pub skip_existing: bool,
    pub tools: &'a ToolPaths,
    pub runner: &'a dyn ToolRunner,
    pub os: TargetOs,
    pub arch: Option<HostArch>,
    /// Per-package build logs are appended here when set
    pub log_dir: Option<PathBuf>,
}

impl<'a> BuildContext<'a> {
    pub fn new(
        mode: BuildMode,
        install_dir: impl Into<PathBuf>,
        source_dir: impl Into<PathBuf>,
        tools: &'a ToolPaths,
        runner: &'a dyn ToolRunner,
    ) -> Self {
        Self {
            mode,
            install_dir: install_dir.into(),
            source_dir: source_dir.into(),
            skip_existing: false,
            tools,
            runner,
            os: TargetOs::host(),
            arch: HostArch::detect(),
            log_dir: None,
        }
    }

    pub fn with_skip_existing(mut self, skip: bool) -> Self {
        self.skip_existing = skip;
        self
    }

    pub fn with_os(mut self, os: TargetOs) -> Self {
        self.os = os;
        self
    }

    pub fn with_arch(mut self, arch: Option<HostArch>) -> Self {
        self.arch = arch;
        self
    }

    pub fn with_log_dir(mut self, log_dir: Option<PathBuf>) -> Self {
        self.log_dir = log_dir;
        self
    }

    /// Same settings, different package source tree
    pub fn for_source(&self, source_dir: impl Into<PathBuf>) -> BuildContext<'a> {
        BuildContext {
            mode: self.mode,
            install_dir: self.install_dir.clone(),
            source_dir: source_dir.into(),
            skip_existing: self.skip_existing,
            tools: self.tools,
            runner: self.runner,
            os: self.os,
            arch: self.arch,
            log_dir: self.log_dir.clone(),
        }
    }

    /// Path inside the LibPack
    pub fn install_path(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.install_dir.join(relative)
    }

    /// Invocation of `program` with the package source as working directory
    pub fn command(&self, program: impl Into<PathBuf>) -> Invocation {
        Invocation::new(program, &self.source_dir)
    }

    /// Log file for `package`, if logging is enabled
    pub fn log_path(&self, package: &str) -> Option<PathBuf> {
        self.log_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.log", package)))
    }

    /// Start a fresh log for `package`
    pub fn reset_log(&self, package: &str) {
        if let Some(path) = self.log_path(package) {
            let created = path
                .parent()
                .map(fs::create_dir_all)
                .transpose()
                .and_then(|_| fs::write(&path, ""));
            if let Err(e) = created {
                warn!("Cannot write build log {}: {}", path.display(), e);
            }
        }
    }

    fn append_log(&self, package: &str, invocation: &Invocation, output: &ToolOutput) {
        let Some(path) = self.log_path(package) else {
            return;
        };
        let written = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut log| {
                writeln!(log, "=== {} ===", invocation.display())?;
                writeln!(log, "(in {})", invocation.cwd.display())?;
                if !output.stdout.is_empty() {
                    writeln!(log, "stdout:\n{}", output.stdout)?;
                }
                if !output.stderr.is_empty() {
                    writeln!(log, "stderr:\n{}", output.stderr)?;
                }
                writeln!(log, "exit: {:?}", output.code)
            });
        if let Err(e) = written {
            warn!("Cannot append to build log {}: {}", path.display(), e);
        }
    }

    /// Run a build step for `package`, failing with `BuildFailed` on non-zero exit
    pub fn run(&self, package: &str, invocation: Invocation) -> Result<ToolOutput> {
        debug!("[{}] {}", package, invocation.display());
        let output = self.runner.run(&invocation).map_err(|e| match e {
            Error::ToolFailed { reason, .. } => Error::BuildFailed {
                package: package.to_string(),
                exit_code: None,
                output: format!("could not run {}: {}", invocation.display(), reason),
            },
            other => other,
        })?;

        self.append_log(package, &invocation, &output);

        if !output.success() {
            return Err(Error::BuildFailed {
                package: package.to_string(),
                exit_code: output.code,
                output: output.combined(),
            });
        }
        Ok(output)
    }
}
