// src/main.rs

use anyhow::Result;
use clap::Parser;
use libpack::pipeline::{PipelineConfig, ToolPaths};
use std::time::Duration;

mod cli;
mod commands;

use cli::{Cli, Commands};

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Some(Commands::Build {
            output_root,
            mode,
            config,
            working,
            skip_existing_clone,
            skip_existing_build,
            silent,
            archiver,
            bison,
            cmake,
            git,
            jobs,
            timeout,
            no_inhibit,
            keep_components,
        }) => {
            let tools = ToolPaths::default()
                .with_git(git)
                .with_archiver(archiver)
                .with_cmake(cmake)
                .with_bison(bison);

            let mut pipeline_config = PipelineConfig::default()
                .with_manifest(config)
                .with_working_dir(working)
                .with_output_root(output_root)
                .with_mode(mode.into())
                .with_reuse_sources(skip_existing_clone)
                .with_skip_existing_builds(skip_existing_build)
                .with_inhibit_sleep(!no_inhibit)
                .with_strip_components(!keep_components)
                .with_tools(tools)
                .with_timeout(timeout.map(Duration::from_secs));
            if let Some(jobs) = jobs {
                pipeline_config = pipeline_config.with_jobs(jobs);
            }

            commands::cmd_build(pipeline_config, silent)
        }
        Some(Commands::Init {
            output_root,
            mode,
            config,
        }) => commands::cmd_init(
            PipelineConfig::default()
                .with_manifest(config)
                .with_output_root(output_root)
                .with_mode(mode.into()),
        ),
        Some(Commands::Sanitize {
            dir,
            keep_components,
        }) => commands::cmd_sanitize(&dir, keep_components),
        Some(Commands::Patch { patch_file, root }) => commands::cmd_patch(&patch_file, &root),
        Some(Commands::Check {
            archiver,
            bison,
            cmake,
            git,
        }) => commands::cmd_check(
            &ToolPaths::default()
                .with_git(git)
                .with_archiver(archiver)
                .with_cmake(cmake)
                .with_bison(bison),
        ),
        None => {
            println!("LibPack builder v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'libpack --help' for usage information");
            Ok(())
        }
    }
}
