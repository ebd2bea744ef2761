// src/commands/mod.rs

//! Command handlers for the LibPack CLI

use anyhow::{Context, Result};
use libpack::pipeline::{Pipeline, PipelineConfig, ToolPaths};
use libpack::{SanitizeConfig, Sanitizer};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

/// Ask a yes/no question; anything but `y` counts as no
pub fn confirm<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> io::Result<bool> {
    write!(output, "{} y/N ", question)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("y"))
}

/// Delete a directory tree, asking first unless `silent`
///
/// Returns whether the tree was removed. A missing path is left alone.
pub fn delete_existing<R: BufRead, W: Write>(
    path: &Path,
    silent: bool,
    input: &mut R,
    output: &mut W,
) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }

    let remove = silent
        || confirm(
            &format!("Really delete entire path {}?", path.display()),
            input,
            output,
        )?;

    if !remove {
        writeln!(output, "NOT removing {}", path.display())?;
        return Ok(false);
    }

    if !silent {
        writeln!(output, "Removing {} prior to beginning", path.display())?;
    }
    std::fs::remove_dir_all(path)
        .with_context(|| format!("Failed to remove {}", path.display()))?;
    Ok(true)
}

/// Run the full pipeline
pub fn cmd_build(config: PipelineConfig, silent: bool) -> Result<()> {
    if !config.reuse_sources {
        let stdin = io::stdin();
        delete_existing(
            &config.working_dir,
            silent,
            &mut stdin.lock(),
            &mut io::stdout(),
        )?;
    }

    let report = Pipeline::new(config).run()?;

    println!("LibPack created at {}", report.output_dir.display());
    println!("  Packages: {}", report.built.len());
    if !report.sanitize.errors.is_empty() {
        println!(
            "  Cleanup problems: {} (see log output)",
            report.sanitize.errors.len()
        );
    }
    Ok(())
}

/// Prepare the output directory without building anything
pub fn cmd_init(config: PipelineConfig) -> Result<()> {
    let path = Pipeline::new(config).init_output()?;
    println!("Output directory ready at {}", path.display());
    Ok(())
}

/// Sanitize an existing LibPack
pub fn cmd_sanitize(dir: &Path, keep_components: bool) -> Result<()> {
    let sanitizer = Sanitizer::new(SanitizeConfig::default().with_strip_components(!keep_components));
    let report = sanitizer
        .run(dir)
        .with_context(|| format!("Failed to sanitize {}", dir.display()))?;

    println!("Sanitized {}", dir.display());
    println!("  Deleted: {}", report.deleted.len() + report.stripped.len());
    println!("  Metadata files rewritten: {}", report.rewritten);
    println!("  Known references fixed: {}", report.fixed);
    if !report.errors.is_empty() {
        println!("  Problems: {}", report.errors.len());
    }
    Ok(())
}

/// Apply one patch document
pub fn cmd_patch(patch_file: &Path, root: &Path) -> Result<()> {
    info!("Applying {} in {}", patch_file.display(), root.display());
    let count = libpack::patch::apply_patch_file(root, patch_file)
        .with_context(|| format!("Failed to apply {}", patch_file.display()))?;
    println!("Patched {} files", count);
    Ok(())
}

/// Print where each external tool was found
///
/// Fails when any required tool is missing; the parser generator is optional.
pub fn cmd_check(tools: &ToolPaths) -> Result<()> {
    let mut missing = Vec::new();
    for status in tools.check() {
        match &status.resolved {
            Some(path) => println!("  [OK]      {:<9} {}", status.name, path.display()),
            None => {
                println!(
                    "  [MISSING] {:<9} {}",
                    status.name,
                    status.configured.display()
                );
                if status.name != "bison" {
                    missing.push(status.name);
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("Missing required tools: {}", missing.join(", ")))
    }
}
