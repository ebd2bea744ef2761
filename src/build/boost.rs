// src/build/boost.rs

//! Boost
//!
//! Boost's own build system needs a `user-config.jam` pointing at the
//! LibPack's Python so boost-python links against it. The bootstrap script
//! builds `b2`, which then builds the libraries into `stage/lib`.

use super::{BuildContext, BuildProcedure, PythonProcedure, TargetOs};
use crate::error::Result;
use crate::filesystem::copy_tree;
use crate::manifest::PackageEntry;
use crate::output::BIN_DIR;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

pub struct BoostProcedure;

/// Jam files treat backslashes as escapes
fn jam_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}

impl BoostProcedure {
    /// Contents of `tools/build/src/user-config.jam`
    pub fn user_config(ctx: &BuildContext<'_>, python_version: &str) -> String {
        let exe = PythonProcedure::executable(ctx);
        let (include, lib) = match ctx.os {
            TargetOs::Windows => {
                let bin = ctx.install_path(BIN_DIR);
                (bin.join("Include"), bin.join("Lib"))
            }
            TargetOs::Unix => (
                ctx.install_path("include").join(format!("python{}", python_version)),
                ctx.install_path("lib"),
            ),
        };
        format!(
            "using python : {} : \"{}\" : \"{}\" : \"{}\"  ;\n",
            python_version,
            jam_path(&exe),
            jam_path(&include),
            jam_path(&lib)
        )
    }
}

impl BuildProcedure for BoostProcedure {
    fn name(&self) -> &str {
        "boost"
    }

    fn marker(&self, ctx: &BuildContext<'_>) -> Option<PathBuf> {
        Some(ctx.install_path("include").join("boost"))
    }

    fn build(&self, _entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<()> {
        let python_version = PythonProcedure::version(ctx)?;
        info!("Building boost-python with Python {}", python_version);

        let jam = ctx
            .source_dir
            .join("tools")
            .join("build")
            .join("src")
            .join("user-config.jam");
        if let Some(parent) = jam.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&jam, Self::user_config(ctx, &python_version))?;

        let (bootstrap, b2) = match ctx.os {
            TargetOs::Windows => ("bootstrap.bat", "b2.exe"),
            TargetOs::Unix => ("bootstrap.sh", "b2"),
        };
        ctx.run("boost", ctx.command(ctx.source_dir.join(bootstrap)))?;
        ctx.run(
            "boost",
            ctx.command(ctx.source_dir.join(b2))
                .arg(format!("variant={}", ctx.mode.variant())),
        )?;

        copy_tree(
            &ctx.source_dir.join("stage").join("lib"),
            &ctx.install_path("lib"),
        )?;
        copy_tree(
            &ctx.source_dir.join("boost"),
            &ctx.install_path("include").join("boost"),
        )?;
        Ok(())
    }
}
