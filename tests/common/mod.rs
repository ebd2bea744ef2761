// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use flate2::Compression;
use flate2::write::GzEncoder;
use libpack::{Invocation, RecordingRunner, ToolOutput};
use std::fs;
use std::path::{Path, PathBuf};

/// Write a manifest with the given `content` entries (JSON array body) into `dir`
pub fn write_manifest(dir: &Path, content: &str) -> PathBuf {
    let path = dir.join("config.json");
    let json = format!(
        r#"{{
  "FreeCAD-version": "1.0.0",
  "LibPack-version": "3.0.0",
  "content": [{}]
}}"#,
        content
    );
    fs::write(&path, json).unwrap();
    path
}

/// Gzipped tarball with the given `(path, contents)` members
pub fn tarball(files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, path, contents.as_bytes())
            .unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Runner that fakes `git clone` by creating the target directory
///
/// Every other command succeeds with no output.
pub fn cloning_runner() -> RecordingRunner {
    RecordingRunner::with_handler(|inv: &Invocation| {
        if inv.args.first().map(String::as_str) == Some("clone")
            && let Some(name) = inv.args.last()
        {
            fs::create_dir_all(inv.cwd.join(name))?;
        }
        Ok(ToolOutput::ok(""))
    })
}

/// Directory tree shaped like a finished LibPack with build-machine paths baked in
pub fn dirty_libpack(root: &Path) -> PathBuf {
    let base = root.join("LibPack-1.0.0-v3.0.0-Release");
    let absolute = std::path::absolute(&base).unwrap();
    let abs = absolute.display().to_string();

    fs::create_dir_all(base.join("bin")).unwrap();
    fs::create_dir_all(base.join("lib/cmake/opencascade")).unwrap();
    fs::create_dir_all(base.join("lib/cmake/Qt6WebEngineCore")).unwrap();

    fs::write(base.join("custom.bat"), "@echo off").unwrap();
    fs::write(base.join("env.bat"), "set PATH=...").unwrap();
    fs::write(base.join("bin/h5dump.exe"), "").unwrap();
    fs::write(base.join("bin/zlib.dll"), "").unwrap();
    fs::write(base.join("lib/cmake/Qt6WebEngineCore/Qt6WebEngineCoreConfig.cmake"), "").unwrap();

    fs::write(
        base.join("lib/cmake/opencascade/OpenCASCADEConfig.cmake"),
        format!(
            "set(OpenCASCADE_INSTALL_PREFIX \"{abs}\")\nset(OpenCASCADE_INCLUDE_DIR \"{abs}/include/opencascade\")\n"
        ),
    )
    .unwrap();
    fs::write(
        base.join("lib/cmake/opencascade/OpenCASCADEVisualizationTargets-release.cmake"),
        "set_property(TARGET TKService PROPERTY IMPORTED_LOCATION_RELEASE \"freetype.lib\")\n",
    )
    .unwrap();

    base
}
