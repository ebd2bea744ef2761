// src/acquire/mod.rs

//! Acquisition engine
//!
//! Obtains every package's source tree under the working directory, one
//! subdirectory per manifest entry, then applies the entry's patches.
//! Entries touch disjoint directories, so they are fetched on a bounded
//! worker pool. Every operation takes explicit absolute paths; nothing
//! changes the process working directory.

mod download;
mod extract;
pub mod git;

pub use download::{Downloader, url_basename};
pub use extract::{ArchiveKind, extract, unpack_tar};

use crate::error::{Error, Result};
use crate::manifest::{Acquisition, HostArch, Manifest, PackageEntry};
use crate::patch;
use crate::pipeline::ToolPaths;
use crate::process::ToolRunner;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Default bound on concurrent acquisitions
pub const DEFAULT_JOBS: usize = 4;

/// What happened to one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Directory already existed and reuse was requested
    Reused,
    Cloned,
    Downloaded,
    /// No acquisition method; only the directory was created
    Created,
}

/// Fetches manifest entries into a working directory
pub struct Fetcher<'a> {
    manifest: &'a Manifest,
    working_dir: PathBuf,
    tools: &'a ToolPaths,
    runner: &'a dyn ToolRunner,
    downloader: Downloader,
    reuse_existing: bool,
    jobs: usize,
    host: Option<HostArch>,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        manifest: &'a Manifest,
        working_dir: impl Into<PathBuf>,
        tools: &'a ToolPaths,
        runner: &'a dyn ToolRunner,
    ) -> Result<Self> {
        Ok(Self {
            manifest,
            working_dir: working_dir.into(),
            tools,
            runner,
            downloader: Downloader::new()?,
            reuse_existing: false,
            jobs: DEFAULT_JOBS,
            host: HostArch::detect(),
        })
    }

    /// Skip entries whose directory already exists
    pub fn with_reuse(mut self, reuse: bool) -> Self {
        self.reuse_existing = reuse;
        self
    }

    /// Maximum number of entries fetched at once
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Override the detected host architecture used for `url-arch`
    pub fn with_host_arch(mut self, host: Option<HostArch>) -> Self {
        self.host = host;
        self
    }

    /// Directory an entry is fetched into
    pub fn target_dir(&self, entry: &PackageEntry) -> PathBuf {
        self.working_dir.join(&entry.name)
    }

    /// Fetch every entry, in parallel
    ///
    /// All acquisition methods are resolved before any work starts, so a
    /// malformed entry fails the run without anything being cloned. If any
    /// entry fails, the first failure in manifest order is returned.
    pub fn fetch_all(&self) -> Result<Vec<(String, FetchOutcome)>> {
        let plan: Vec<(&PackageEntry, Acquisition)> = self
            .manifest
            .content
            .iter()
            .map(|entry| Ok((entry, entry.acquisition(self.host)?)))
            .collect::<Result<_>>()?;

        fs::create_dir_all(&self.working_dir).map_err(|e| {
            Error::IoError(format!(
                "Failed to create working directory {}: {}",
                self.working_dir.display(),
                e
            ))
        })?;

        info!(
            "Fetching {} packages into {} ({} at a time)",
            plan.len(),
            self.working_dir.display(),
            self.jobs
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| Error::ConfigError(format!("Failed to start worker pool: {}", e)))?;

        let results: Vec<Result<FetchOutcome>> = pool.install(|| {
            plan.par_iter()
                .map(|(entry, acquisition)| {
                    let result = self.fetch_entry(entry, acquisition);
                    if let Err(e) = &result {
                        error!("Failed to fetch {}: {}", entry.name, e);
                    }
                    result
                })
                .collect()
        });

        plan.iter()
            .zip(results)
            .map(|((entry, _), result)| result.map(|outcome| (entry.name.clone(), outcome)))
            .collect()
    }

    /// Fetch a single entry and apply its patches
    pub fn fetch_entry(&self, entry: &PackageEntry, acquisition: &Acquisition) -> Result<FetchOutcome> {
        let target = self.target_dir(entry);

        if self.reuse_existing && target.exists() {
            info!("Using existing {} (not re-fetching)", target.display());
            return Ok(FetchOutcome::Reused);
        }

        let outcome = match acquisition {
            Acquisition::Git {
                repo,
                reference,
                hash,
            } => {
                git::clone(
                    self.runner,
                    &self.tools.git,
                    &self.working_dir,
                    &entry.name,
                    repo,
                    reference.as_deref(),
                    hash.as_deref(),
                )?;
                FetchOutcome::Cloned
            }
            Acquisition::Download { url } => {
                let archive = self.downloader.download(url, &target)?;
                extract(&archive, &target, &self.tools.archiver, self.runner)?;
                FetchOutcome::Downloaded
            }
            Acquisition::Bare => {
                fs::create_dir_all(&target)?;
                FetchOutcome::Created
            }
        };

        self.apply_patches(entry, &target)?;
        Ok(outcome)
    }

    fn apply_patches(&self, entry: &PackageEntry, target: &Path) -> Result<()> {
        for patch_file in self.manifest.patch_paths(entry) {
            info!("Patching {} with {}", entry.name, patch_file.display());
            patch::apply_patch_file(target, &patch_file)?;
        }
        Ok(())
    }
}
