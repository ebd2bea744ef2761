// src/build/qt.rs

//! Qt is not compiled here; the pre-built installation named by the entry's
//! `install-directory` option is copied into the LibPack.

use super::{BuildContext, BuildProcedure};
use crate::error::{Error, Result};
use crate::filesystem::copy_tree;
use crate::manifest::PackageEntry;
use std::path::{Path, PathBuf};
use tracing::info;

/// Manifest option naming the Qt installation to copy
pub const INSTALL_DIRECTORY_OPTION: &str = "install-directory";

pub struct QtProcedure;

impl BuildProcedure for QtProcedure {
    fn name(&self) -> &str {
        "qt"
    }

    fn marker(&self, ctx: &BuildContext<'_>) -> Option<PathBuf> {
        Some(ctx.install_path("metatypes"))
    }

    fn build(&self, entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<()> {
        let qt_dir = entry.option_str(INSTALL_DIRECTORY_OPTION).ok_or_else(|| {
            Error::ConfigError(format!(
                "Package '{}' needs an '{}' option",
                entry.name, INSTALL_DIRECTORY_OPTION
            ))
        })?;
        let qt_dir = Path::new(qt_dir);

        if !qt_dir.is_dir() {
            return Err(Error::ConfigError(format!(
                "Specified Qt installation path does not exist ({})",
                qt_dir.display()
            )));
        }

        info!("Copying Qt from {}", qt_dir.display());
        let copied = copy_tree(qt_dir, &ctx.install_dir)?;
        info!("Copied {} Qt files", copied);
        Ok(())
    }
}
