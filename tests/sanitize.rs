// tests/sanitize.rs

//! Sanitation of a finished LibPack tree.

mod common;

use libpack::sanitize::{self, PLACEHOLDER};
use libpack::{SanitizeConfig, Sanitizer};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_full_sanitation_pass() {
    let temp = TempDir::new().unwrap();
    let base = common::dirty_libpack(temp.path());

    let report = Sanitizer::default().run(&base).unwrap();

    assert!(report.errors.is_empty(), "{:?}", report.errors);
    assert_eq!(report.deleted.len(), 2);
    assert!(!base.join("custom.bat").exists());
    assert!(!base.join("env.bat").exists());

    // Helper executable and web engine component are gone, the rest stays
    assert!(!base.join("bin/h5dump.exe").exists());
    assert!(!base.join("lib/cmake/Qt6WebEngineCore").exists());
    assert!(base.join("bin/zlib.dll").exists());

    let config = fs::read_to_string(base.join("lib/cmake/opencascade/OpenCASCADEConfig.cmake")).unwrap();
    assert_eq!(
        config,
        format!(
            "set(OpenCASCADE_INSTALL_PREFIX \"{p}/../../..\")\nset(OpenCASCADE_INCLUDE_DIR \"{p}/../../../include/opencascade\")\n",
            p = PLACEHOLDER
        )
    );

    let targets = fs::read_to_string(
        base.join("lib/cmake/opencascade/OpenCASCADEVisualizationTargets-release.cmake"),
    )
    .unwrap();
    assert!(targets.contains("\"${_IMPORT_PREFIX}/lib/freetype.lib\""));
    assert_eq!(report.fixed, 1);
}

#[test]
fn test_sanitation_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let base = common::dirty_libpack(temp.path());
    let config_file = base.join("lib/cmake/opencascade/OpenCASCADEConfig.cmake");
    let targets_file = base.join("lib/cmake/opencascade/OpenCASCADEVisualizationTargets-release.cmake");

    Sanitizer::default().run(&base).unwrap();
    let config_once = fs::read_to_string(&config_file).unwrap();
    let targets_once = fs::read_to_string(&targets_file).unwrap();

    let second = Sanitizer::default().run(&base).unwrap();

    assert!(second.deleted.is_empty());
    assert!(second.stripped.is_empty());
    assert_eq!(second.rewritten, 0);
    assert_eq!(second.fixed, 0);
    assert_eq!(fs::read_to_string(&config_file).unwrap(), config_once);
    assert_eq!(fs::read_to_string(&targets_file).unwrap(), targets_once);
}

#[test]
fn test_keep_components() {
    let temp = TempDir::new().unwrap();
    let base = common::dirty_libpack(temp.path());

    let sanitizer = Sanitizer::new(SanitizeConfig::default().with_strip_components(false));
    let report = sanitizer.run(&base).unwrap();

    assert!(report.stripped.is_empty());
    assert!(base.join("bin/h5dump.exe").exists());
    assert!(base.join("lib/cmake/Qt6WebEngineCore").exists());
    // Denylisted files are still removed
    assert!(!base.join("custom.bat").exists());
}

#[test]
fn test_missing_tree_is_an_error() {
    let temp = TempDir::new().unwrap();
    assert!(Sanitizer::default().run(&temp.path().join("missing")).is_err());
}

#[test]
fn test_depth_string_with_messy_separators() {
    for base in ["Z:\\X\\Y\\", "Z:\\X\\Y"] {
        for file in [
            "Z:\\X\\Y\\lib\\cmake\\mock.cmake",
            "Z:\\X\\Y\\\\lib\\cmake\\\\mock.cmake",
        ] {
            assert_eq!(sanitize::create_depth_string(base, file).unwrap(), "../../");
        }
    }
}
