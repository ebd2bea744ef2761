// src/build/cmake.rs

//! Packages built with CMake
//!
//! All of them follow configure, build, install with the LibPack as both
//! install prefix and prefix path, so later packages find earlier ones.
//! Package-specific flags come from the table below plus the entry's
//! `cmake-args` option.

use super::{BuildContext, BuildProcedure};
use crate::error::{Error, Result};
use crate::manifest::PackageEntry;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Manifest option with extra configure arguments
pub const CMAKE_ARGS_OPTION: &str = "cmake-args";

/// Manifest option naming the subdirectory holding the top-level `CMakeLists.txt`
pub const SOURCE_SUBDIR_OPTION: &str = "source-subdir";

/// Static description of a CMake-built package
#[derive(Debug, Clone, Copy)]
pub struct CMakePackage {
    pub name: &'static str,
    /// Installed file that marks the package as present
    pub marker: &'static str,
    pub args: &'static [&'static str],
}

pub const CMAKE_PACKAGES: &[CMakePackage] = &[
    CMakePackage {
        name: "zlib",
        marker: "include/zlib.h",
        args: &[],
    },
    CMakePackage {
        name: "bzip2",
        marker: "include/bzlib.h",
        args: &["-DENABLE_LIB_ONLY=ON", "-DENABLE_SHARED_LIB=ON", "-DENABLE_STATIC_LIB=OFF"],
    },
    CMakePackage {
        name: "freetype",
        marker: "include/freetype2/ft2build.h",
        args: &["-DBUILD_SHARED_LIBS=ON", "-DFT_DISABLE_HARFBUZZ=ON"],
    },
    CMakePackage {
        name: "yaml-cpp",
        marker: "include/yaml-cpp/yaml.h",
        args: &["-DYAML_BUILD_SHARED_LIBS=ON", "-DYAML_CPP_BUILD_TESTS=OFF"],
    },
    CMakePackage {
        name: "xerces-c",
        marker: "include/xercesc/util/XercesVersion.hpp",
        args: &["-DBUILD_SHARED_LIBS=ON"],
    },
    CMakePackage {
        name: "pybind11",
        marker: "include/pybind11/pybind11.h",
        args: &["-DPYBIND11_TEST=OFF"],
    },
    CMakePackage {
        name: "coin",
        marker: "include/Inventor/SoDB.h",
        args: &["-DCOIN_BUILD_TESTS=OFF", "-DCOIN_BUILD_DOCUMENTATION=OFF"],
    },
    CMakePackage {
        name: "hdf5",
        marker: "include/hdf5.h",
        args: &["-DBUILD_TESTING=OFF", "-DHDF5_BUILD_EXAMPLES=OFF"],
    },
    CMakePackage {
        name: "medfile",
        marker: "include/med.h",
        args: &["-DMEDFILE_BUILD_TESTS=OFF", "-DMEDFILE_INSTALL_DOC=OFF"],
    },
    CMakePackage {
        name: "opencascade",
        marker: "include/opencascade/Standard.hxx",
        args: &["-DBUILD_DOC_Overview=OFF", "-DINSTALL_DIR_LAYOUT=Unix"],
    },
];

pub struct CMakeProcedure {
    package: CMakePackage,
}

impl CMakeProcedure {
    pub fn new(package: &CMakePackage) -> Self {
        Self { package: *package }
    }

    /// Directory holding the top-level `CMakeLists.txt`
    ///
    /// Tarballs usually unpack into a single versioned subdirectory, which
    /// is used when the package root has no `CMakeLists.txt` of its own.
    pub fn source_root(entry: &PackageEntry, source_dir: &Path) -> Result<PathBuf> {
        if let Some(subdir) = entry.option_str(SOURCE_SUBDIR_OPTION) {
            return crate::filesystem::safe_join(source_dir, subdir);
        }
        if source_dir.join("CMakeLists.txt").exists() {
            return Ok(source_dir.to_path_buf());
        }

        let candidates: Vec<PathBuf> = fs::read_dir(source_dir)
            .map_err(|e| {
                Error::IoError(format!("Cannot read {}: {}", source_dir.display(), e))
            })?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.join("CMakeLists.txt").exists())
            .collect();

        match candidates.as_slice() {
            [only] => Ok(only.clone()),
            _ => Err(Error::ConfigError(format!(
                "No CMakeLists.txt found in {} (set '{}')",
                source_dir.display(),
                SOURCE_SUBDIR_OPTION
            ))),
        }
    }

    /// Arguments for the configure step
    pub fn configure_args(&self, entry: &PackageEntry, ctx: &BuildContext<'_>, source: &Path, build: &Path) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            source.display().to_string(),
            "-B".to_string(),
            build.display().to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", ctx.mode),
            format!("-DCMAKE_INSTALL_PREFIX={}", ctx.install_dir.display()),
            format!("-DCMAKE_PREFIX_PATH={}", ctx.install_dir.display()),
        ];
        if let Some(bison) = &ctx.tools.bison {
            args.push(format!("-DBISON_EXECUTABLE={}", bison.display()));
        }
        args.extend(self.package.args.iter().map(|a| a.to_string()));
        args.extend(entry.option_list(CMAKE_ARGS_OPTION));
        args
    }
}

impl BuildProcedure for CMakeProcedure {
    fn name(&self) -> &str {
        self.package.name
    }

    fn marker(&self, ctx: &BuildContext<'_>) -> Option<PathBuf> {
        Some(ctx.install_path(self.package.marker))
    }

    fn build(&self, entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<()> {
        let name = self.package.name;
        let source = Self::source_root(entry, &ctx.source_dir)?;
        let build = ctx.source_dir.join("libpack-build");
        debug!("{}: source {} build {}", name, source.display(), build.display());

        let cmake = &ctx.tools.cmake;
        let mode = ctx.mode.as_str();

        info!("Configuring {}", name);
        ctx.run(name, ctx.command(cmake).args(self.configure_args(entry, ctx, &source, &build)))?;

        info!("Compiling {}", name);
        ctx.run(
            name,
            ctx.command(cmake)
                .args(["--build".to_string(), build.display().to_string()])
                .args(["--config", mode, "--parallel"]),
        )?;

        info!("Installing {}", name);
        ctx.run(
            name,
            ctx.command(cmake)
                .args(["--install".to_string(), build.display().to_string()])
                .args(["--config", mode]),
        )?;
        Ok(())
    }
}
