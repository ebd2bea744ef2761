// build.rs

use clap::{Arg, ArgAction, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: build mode
fn mode_arg() -> Arg {
    Arg::new("mode")
        .short('m')
        .long("mode")
        .value_parser(["debug", "release"])
        .default_value("release")
        .help("Build mode")
}

/// Common argument: manifest path
fn config_arg() -> Arg {
    Arg::new("config")
        .short('c')
        .long("config")
        .value_name("PATH")
        .default_value("config.json")
        .help("Path to the manifest")
}

/// Common argument: output root directory
fn output_root_arg() -> Arg {
    Arg::new("output_root")
        .default_value(".")
        .help("Directory the LibPack directory is created in")
}

fn tool_arg(name: &'static str, default: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).value_name("PATH").default_value(default).help(help)
}

fn flag(name: &'static str, help: &'static str) -> Arg {
    Arg::new(name).long(name).action(ArgAction::SetTrue).help(help)
}

fn build_cli() -> Command {
    Command::new("libpack")
        .version(env!("CARGO_PKG_VERSION"))
        .author("LibPack Contributors")
        .about("Build a bundle of precompiled third-party libraries from a manifest")
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Enable debug logging (RUST_LOG takes precedence)"),
        )
        .subcommand(
            Command::new("build")
                .about("Acquire, build and sanitize every package in the manifest")
                .long_about(
                    "Acquire, build and sanitize every package in the manifest.\n\n\
                     Only one run may target an output directory at a time; no lock is taken.",
                )
                .arg(output_root_arg())
                .arg(mode_arg())
                .arg(config_arg())
                .arg(
                    Arg::new("working")
                        .short('w')
                        .long("working")
                        .value_name("DIR")
                        .default_value("working")
                        .help("Directory sources are acquired into"),
                )
                .arg(
                    flag("skip-existing-clone", "Keep the working directory and reuse packages already acquired")
                        .short('e'),
                )
                .arg(
                    flag("skip-existing-build", "Reuse the output directory and skip packages already installed")
                        .short('b'),
                )
                .arg(flag("silent", "Do not ask before deleting the working directory").short('s'))
                .arg(tool_arg("archiver", "7z", "7-Zip compatible archiver"))
                .arg(
                    Arg::new("bison")
                        .long("bison")
                        .value_name("PATH")
                        .help("Parser generator handed to packages that need one"),
                )
                .arg(tool_arg("cmake", "cmake", "CMake executable"))
                .arg(tool_arg("git", "git", "Git executable"))
                .arg(
                    Arg::new("jobs")
                        .short('j')
                        .long("jobs")
                        .value_name("N")
                        .help("Maximum concurrent acquisitions"),
                )
                .arg(
                    Arg::new("timeout")
                        .long("timeout")
                        .value_name("SECS")
                        .help("Kill any external tool running longer than this"),
                )
                .arg(flag("no-inhibit", "Let the machine sleep during the build"))
                .arg(flag("keep-components", "Keep optional components that are normally stripped")),
        )
        .subcommand(
            Command::new("init")
                .about("Create the output directory only, rotating any existing one")
                .arg(output_root_arg())
                .arg(mode_arg())
                .arg(config_arg()),
        )
        .subcommand(
            Command::new("sanitize")
                .about("Make an existing LibPack relocatable and remove installer debris")
                .arg(Arg::new("dir").required(true).help("LibPack directory"))
                .arg(flag("keep-components", "Keep optional components that are normally stripped")),
        )
        .subcommand(
            Command::new("patch")
                .about("Apply a patch document to a source tree")
                .arg(Arg::new("patch_file").required(true).help("Patch document"))
                .arg(
                    Arg::new("root")
                        .short('r')
                        .long("root")
                        .default_value(".")
                        .help("Directory the patched file names are relative to"),
                ),
        )
        .subcommand(
            Command::new("check")
                .about("Report which external tools can be found")
                .arg(tool_arg("archiver", "7z", "7-Zip compatible archiver"))
                .arg(Arg::new("bison").long("bison").value_name("PATH").help("Parser generator"))
                .arg(tool_arg("cmake", "cmake", "CMake executable"))
                .arg(tool_arg("git", "git", "Git executable")),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("libpack.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
