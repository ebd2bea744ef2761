// src/build/mod.rs

//! Build dispatcher
//!
//! Every manifest entry name maps onto exactly one [`BuildProcedure`] in a
//! closed [`BuildRegistry`]. A name with no procedure is an error, never a
//! silent default. Packages build strictly in manifest order because later
//! packages find earlier ones through the shared install tree; the first
//! failure stops the run.
//!
//! Per package the flow is `NotStarted -> Skipped | Building -> Built | Failed`.
//! A package is skipped when skipping is enabled and its procedure's marker
//! path already exists in the install tree.

mod boost;
mod cmake;
mod context;
mod python;
mod qt;

pub use boost::BoostProcedure;
pub use cmake::{CMAKE_PACKAGES, CMakePackage, CMakeProcedure};
pub use context::{BuildContext, TargetOs};
pub use python::PythonProcedure;
pub use qt::QtProcedure;

use crate::error::{Error, Result};
use crate::manifest::{Manifest, PackageEntry};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::info;

/// Builds one package into the shared install tree
pub trait BuildProcedure: Send + Sync {
    /// Manifest name this procedure handles
    fn name(&self) -> &str;

    /// Path whose presence means the package is already installed
    fn marker(&self, ctx: &BuildContext<'_>) -> Option<PathBuf>;

    /// Build and install the package
    fn build(&self, entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<()>;
}

/// No-op procedure registered as `nonexistent`, used in tests and dry runs
#[derive(Debug, Default)]
pub struct NoopProcedure;

impl BuildProcedure for NoopProcedure {
    fn name(&self) -> &str {
        "nonexistent"
    }

    fn marker(&self, _ctx: &BuildContext<'_>) -> Option<PathBuf> {
        None
    }

    fn build(&self, _entry: &PackageEntry, _ctx: &BuildContext<'_>) -> Result<()> {
        Ok(())
    }
}

/// Terminal state of a package that did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageOutcome {
    Skipped,
    Built,
}

/// Closed mapping from package name to build procedure
pub struct BuildRegistry {
    procedures: BTreeMap<String, Box<dyn BuildProcedure>>,
}

impl BuildRegistry {
    /// An empty registry
    pub fn new() -> Self {
        Self {
            procedures: BTreeMap::new(),
        }
    }

    /// Registry with every procedure this tool knows
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(NoopProcedure));
        registry.register(Box::new(PythonProcedure));
        registry.register(Box::new(QtProcedure));
        registry.register(Box::new(BoostProcedure));
        for package in CMAKE_PACKAGES {
            registry.register(Box::new(CMakeProcedure::new(package)));
        }
        registry
    }

    /// Add or replace a procedure
    pub fn register(&mut self, procedure: Box<dyn BuildProcedure>) {
        self.procedures
            .insert(procedure.name().to_string(), procedure);
    }

    /// Procedure for `name`
    pub fn get(&self, name: &str) -> Result<&dyn BuildProcedure> {
        self.procedures
            .get(name)
            .map(|p| p.as_ref())
            .ok_or_else(|| Error::UnknownPackage(name.to_string()))
    }

    /// Names with a registered procedure
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.procedures.keys().map(String::as_str)
    }

    /// Fail with `UnknownPackage` for the first entry without a procedure
    pub fn check_manifest(&self, manifest: &Manifest) -> Result<()> {
        for entry in &manifest.content {
            self.get(&entry.name)?;
        }
        Ok(())
    }

    /// Build one entry, honoring the skip policy
    pub fn dispatch(&self, entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<PackageOutcome> {
        let procedure = self.get(&entry.name)?;

        if ctx.skip_existing
            && let Some(marker) = procedure.marker(ctx)
            && marker.exists()
        {
            info!(
                "Not rebuilding {}, {} is already in the LibPack",
                entry.name,
                marker.display()
            );
            return Ok(PackageOutcome::Skipped);
        }

        ctx.reset_log(&entry.name);
        procedure.build(entry, ctx)?;
        Ok(PackageOutcome::Built)
    }

    /// Build every manifest entry in order, stopping at the first failure
    ///
    /// `working_dir` holds the acquired sources, one directory per entry.
    pub fn build_all(
        &self,
        manifest: &Manifest,
        working_dir: &Path,
        ctx: &BuildContext<'_>,
    ) -> Result<Vec<(String, PackageOutcome)>> {
        self.check_manifest(manifest)?;

        let total = manifest.content.len();
        let mut outcomes = Vec::with_capacity(total);

        for (idx, entry) in manifest.content.iter().enumerate() {
            info!(
                "[{}/{}] Building {} in {} mode",
                idx + 1,
                total,
                entry.name,
                ctx.mode
            );
            let package_ctx = ctx.for_source(working_dir.join(&entry.name));
            let outcome = self.dispatch(entry, &package_ctx)?;
            outcomes.push((entry.name.clone(), outcome));
        }

        info!("All {} packages built", total);
        Ok(outcomes)
    }
}

impl Default for BuildRegistry {
    fn default() -> Self {
        Self::standard()
    }
}
