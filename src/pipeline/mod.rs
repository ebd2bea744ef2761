// src/pipeline/mod.rs

//! Pipeline driver
//!
//! One run goes through these stages, stopping at the first fatal error:
//!
//! 1. Load and validate the manifest, and check every package name
//! 2. Prepare the versioned output directory (rotating an old one away)
//! 3. Acquire all packages on a bounded worker pool
//! 4. Build packages one at a time, in manifest order
//! 5. Sanitize the finished tree
//! 6. Write `manifest.json` and `version.txt` at the tree root
//!
//! Stages 3 and 4 run under a sleep inhibitor when enabled.
//!
//! Only one run may target a given output directory at a time. No lock is
//! taken; keeping runs apart is up to the operator.

mod config;

pub use config::{
    DEFAULT_MANIFEST, DEFAULT_WORKING_DIR, MAX_DEFAULT_JOBS, PipelineConfig, ToolPaths,
    ToolStatus, default_jobs,
};

use crate::acquire::{FetchOutcome, Fetcher};
use crate::build::{BuildContext, BuildRegistry, PackageOutcome};
use crate::error::{Error, Result};
use crate::inhibit::SleepInhibitor;
use crate::manifest::{HostArch, Manifest};
use crate::mode::BuildMode;
use crate::output;
use crate::process::{SystemRunner, ToolRunner};
use crate::sanitize::{SanitizeConfig, SanitizeReport, Sanitizer};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Manifest snapshot written into the finished LibPack
pub const MANIFEST_SNAPSHOT: &str = "manifest.json";

/// Version stamp written into the finished LibPack
pub const VERSION_STAMP: &str = "version.txt";

/// Subdirectory of the working directory holding per-package build logs
pub const LOG_DIR: &str = "logs";

/// Result of a successful run
#[derive(Debug)]
pub struct PipelineReport {
    pub output_dir: PathBuf,
    pub fetched: Vec<(String, FetchOutcome)>,
    pub built: Vec<(String, PackageOutcome)>,
    pub sanitize: SanitizeReport,
}

/// Contents of `version.txt`
pub fn version_stamp(manifest: &Manifest, mode: BuildMode, built_at: &str) -> String {
    format!(
        "LibPack-version: {}\nFreeCAD-version: {}\nbuild-mode: {}\nbuild-date: {}\n",
        manifest.libpack_version, manifest.product_version, mode, built_at
    )
}

/// Write the manifest snapshot and version stamp into `output_dir`
pub fn write_snapshot(output_dir: &Path, manifest: &Manifest, mode: BuildMode) -> Result<()> {
    let snapshot = output_dir.join(MANIFEST_SNAPSHOT);
    fs::write(&snapshot, manifest.content_json()?).map_err(|e| {
        Error::IoError(format!("Failed to write {}: {}", snapshot.display(), e))
    })?;

    let stamp = output_dir.join(VERSION_STAMP);
    let built_at = Utc::now().to_rfc3339();
    fs::write(&stamp, version_stamp(manifest, mode, &built_at)).map_err(|e| {
        Error::IoError(format!("Failed to write {}: {}", stamp.display(), e))
    })?;
    Ok(())
}

pub struct Pipeline {
    config: PipelineConfig,
    runner: Arc<dyn ToolRunner>,
    registry: BuildRegistry,
    host: Option<HostArch>,
}

impl Pipeline {
    /// Pipeline running real processes with the configured timeout
    pub fn new(config: PipelineConfig) -> Self {
        let runner = Arc::new(SystemRunner::new().with_timeout(config.timeout));
        Self {
            config,
            runner,
            registry: BuildRegistry::standard(),
            host: HostArch::detect(),
        }
    }

    /// Use a different process runner
    pub fn with_runner(mut self, runner: Arc<dyn ToolRunner>) -> Self {
        self.runner = runner;
        self
    }

    /// Use a different set of build procedures
    pub fn with_registry(mut self, registry: BuildRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Override the detected host architecture
    pub fn with_host_arch(mut self, host: Option<HostArch>) -> Self {
        self.host = host;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Load the configured manifest
    pub fn load_manifest(&self) -> Result<Manifest> {
        Manifest::load(&self.config.manifest_path)
    }

    /// Path of the output directory for `manifest`; no I/O
    pub fn output_path(&self, manifest: &Manifest) -> PathBuf {
        output::resolve_path(
            &self.config.output_root,
            &manifest.product_version,
            &manifest.libpack_version,
            self.config.mode,
        )
    }

    /// Rotate and create the output directory only
    pub fn init_output(&self) -> Result<PathBuf> {
        let manifest = self.load_manifest()?;
        output::prepare(&self.output_path(&manifest), false)
    }

    /// Run every stage
    pub fn run(&self) -> Result<PipelineReport> {
        let manifest = self.load_manifest()?;
        self.registry.check_manifest(&manifest)?;
        info!(
            "Building LibPack {} for FreeCAD {} ({} packages, {} mode)",
            manifest.libpack_version,
            manifest.product_version,
            manifest.content.len(),
            self.config.mode
        );

        let output_dir = output::prepare(
            &self.output_path(&manifest),
            self.config.skip_existing_builds,
        )?;
        let output_dir = std::path::absolute(&output_dir)?;
        let working_dir = std::path::absolute(&self.config.working_dir)?;

        let (fetched, built) = {
            let _inhibitor = if self.config.inhibit_sleep {
                SleepInhibitor::acquire("Building a LibPack")
            } else {
                SleepInhibitor::disabled()
            };

            let fetched = Fetcher::new(&manifest, &working_dir, &self.config.tools, self.runner.as_ref())?
                .with_reuse(self.config.reuse_sources)
                .with_jobs(self.config.jobs)
                .with_host_arch(self.host)
                .fetch_all()?;

            let ctx = BuildContext::new(
                self.config.mode,
                &output_dir,
                &working_dir,
                &self.config.tools,
                self.runner.as_ref(),
            )
            .with_skip_existing(self.config.skip_existing_builds)
            .with_arch(self.host)
            .with_log_dir(Some(working_dir.join(LOG_DIR)));

            let built = self.registry.build_all(&manifest, &working_dir, &ctx)?;
            (fetched, built)
        };

        let sanitizer = Sanitizer::new(
            SanitizeConfig::default().with_strip_components(self.config.strip_components),
        );
        let sanitize = sanitizer.run(&output_dir)?;
        if !sanitize.errors.is_empty() {
            warn!(
                "{} items could not be cleaned up; see the warnings above",
                sanitize.errors.len()
            );
        }

        write_snapshot(&output_dir, &manifest, self.config.mode)?;
        info!("LibPack ready in {}", output_dir.display());

        Ok(PipelineReport {
            output_dir,
            fetched,
            built,
            sanitize,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{RecordingRunner, ToolOutput};
    use tempfile::TempDir;

    fn write_manifest(dir: &Path, content: &str) -> PathBuf {
        let path = dir.join("config.json");
        let json = format!(
            r#"{{"FreeCAD-version": "1.0.0", "LibPack-version": "3.0.0", "content": [{}]}}"#,
            content
        );
        fs::write(&path, json).unwrap();
        path
    }

    fn config(temp: &TempDir, manifest: PathBuf) -> PipelineConfig {
        PipelineConfig::default()
            .with_manifest(manifest)
            .with_working_dir(temp.path().join("working"))
            .with_output_root(temp.path().join("out"))
            .with_inhibit_sleep(false)
    }

    #[test]
    fn test_version_stamp() {
        let manifest = Manifest::new("1.0.0", "3.0.0");
        let stamp = version_stamp(&manifest, BuildMode::Debug, "2026-01-01T00:00:00+00:00");
        assert_eq!(
            stamp,
            "LibPack-version: 3.0.0\nFreeCAD-version: 1.0.0\nbuild-mode: Debug\nbuild-date: 2026-01-01T00:00:00+00:00\n"
        );
    }

    #[test]
    fn test_run_with_noop_package() {
        let temp = TempDir::new().unwrap();
        let manifest = write_manifest(temp.path(), r#"{"name": "nonexistent"}"#);
        let runner = Arc::new(RecordingRunner::new());

        let report = Pipeline::new(config(&temp, manifest))
            .with_runner(runner.clone())
            .run()
            .unwrap();

        let out = temp.path().join("out/LibPack-1.0.0-v3.0.0-Release");
        assert_eq!(report.output_dir, std::path::absolute(&out).unwrap());
        assert_eq!(report.fetched, vec![("nonexistent".to_string(), FetchOutcome::Created)]);
        assert_eq!(report.built, vec![("nonexistent".to_string(), PackageOutcome::Built)]);
        assert!(out.join("bin").is_dir());
        assert!(temp.path().join("working/nonexistent").is_dir());

        let snapshot = fs::read_to_string(out.join(MANIFEST_SNAPSHOT)).unwrap();
        assert!(snapshot.contains("\"nonexistent\""));
        let stamp = fs::read_to_string(out.join(VERSION_STAMP)).unwrap();
        assert!(stamp.starts_with("LibPack-version: 3.0.0\n"));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_unknown_package_stops_before_anything_happens() {
        let temp = TempDir::new().unwrap();
        let manifest = write_manifest(temp.path(), r#"{"name": "mystery"}"#);
        let runner = Arc::new(RecordingRunner::new());

        let err = Pipeline::new(config(&temp, manifest))
            .with_runner(runner.clone())
            .run()
            .unwrap_err();

        assert!(matches!(err, Error::UnknownPackage(ref name) if name == "mystery"));
        assert!(!temp.path().join("out").exists());
        assert!(!temp.path().join("working").exists());
    }

    #[test]
    fn test_build_failure_aborts_without_stamp() {
        let temp = TempDir::new().unwrap();
        let manifest = write_manifest(temp.path(), r#"{"name": "zlib"}, {"name": "nonexistent"}"#);
        let src = temp.path().join("working/zlib");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("CMakeLists.txt"), "").unwrap();

        let runner = Arc::new(RecordingRunner::with_handler(|inv| {
            if inv.args.first().map(String::as_str) == Some("--build") {
                Ok(ToolOutput::failed(1, "compiler exploded"))
            } else {
                Ok(ToolOutput::ok(""))
            }
        }));

        let err = Pipeline::new(config(&temp, manifest).with_reuse_sources(true))
            .with_runner(runner.clone())
            .run()
            .unwrap_err();

        match err {
            Error::BuildFailed { package, output, .. } => {
                assert_eq!(package, "zlib");
                assert!(output.contains("compiler exploded"));
            }
            other => panic!("unexpected error {:?}", other),
        }
        let out = temp.path().join("out/LibPack-1.0.0-v3.0.0-Release");
        assert!(!out.join(VERSION_STAMP).exists());

        let log = fs::read_to_string(temp.path().join("working/logs/zlib.log")).unwrap();
        assert!(log.contains("compiler exploded"));
    }

    #[test]
    fn test_init_output_rotates() {
        let temp = TempDir::new().unwrap();
        let manifest = write_manifest(temp.path(), "");
        let pipeline = Pipeline::new(config(&temp, manifest).with_mode(BuildMode::Debug));

        let first = pipeline.init_output().unwrap();
        let second = pipeline.init_output().unwrap();

        assert_eq!(first, second);
        assert!(first.ends_with("LibPack-1.0.0-v3.0.0-Debug"));
        assert!(first.with_file_name("LibPack-1.0.0-v3.0.0-Debug-backup-a").is_dir());
    }

    #[test]
    fn test_missing_manifest_is_config_error() {
        let temp = TempDir::new().unwrap();
        let err = Pipeline::new(config(&temp, temp.path().join("nope.json")))
            .run()
            .unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
