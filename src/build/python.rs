// src/build/python.rs

//! CPython
//!
//! On Windows the interpreter is built with `PCbuild\build.bat` and its
//! output, standard library and headers are copied into `bin`. Elsewhere
//! the usual configure/make/make install sequence installs straight into
//! the LibPack.

use super::{BuildContext, BuildProcedure, TargetOs};
use crate::error::{Error, Result};
use crate::filesystem::copy_tree;
use crate::manifest::{HostArch, PackageEntry};
use crate::output::BIN_DIR;
use std::path::PathBuf;
use tracing::info;

pub struct PythonProcedure;

impl PythonProcedure {
    /// Interpreter path inside the LibPack
    pub fn executable(ctx: &BuildContext<'_>) -> PathBuf {
        match ctx.os {
            TargetOs::Windows => ctx.install_path(BIN_DIR).join("python.exe"),
            TargetOs::Unix => ctx.install_path(BIN_DIR).join("python3"),
        }
    }

    /// `(build.bat platform, PCbuild output directory)` for the host
    fn windows_platform(arch: Option<HostArch>) -> (&'static str, &'static str) {
        match arch {
            Some(HostArch::Aarch64) => ("ARM64", "arm64"),
            _ => ("x64", "amd64"),
        }
    }

    /// `major.minor` of the LibPack's interpreter
    pub fn version(ctx: &BuildContext<'_>) -> Result<String> {
        let exe = Self::executable(ctx);
        let output = ctx
            .runner
            .run(&ctx.command(&exe).arg("--version"))?;

        let failed = |reason: String| Error::BuildFailed {
            package: "python".to_string(),
            exit_code: output.code,
            output: reason,
        };

        if !output.success() {
            return Err(failed(format!(
                "failed to run the LibPack's Python at {}: {}",
                exe.display(),
                output.combined()
            )));
        }

        // Old interpreters print the version on stderr
        let text = if output.stdout.trim().is_empty() {
            &output.stderr
        } else {
            &output.stdout
        };
        parse_version(text).ok_or_else(|| failed(format!("unrecognized version output '{}'", text.trim())))
    }

    fn build_windows(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let (platform, out_dir) = Self::windows_platform(ctx.arch);
        let pcbuild = ctx.source_dir.join("PCbuild");

        ctx.run(
            "python",
            ctx.command(pcbuild.join("build.bat"))
                .args(["-p", platform, "-c", ctx.mode.as_str()]),
        )?;

        let bin = ctx.install_path(BIN_DIR);
        copy_tree(&pcbuild.join(out_dir), &bin)?;
        copy_tree(&ctx.source_dir.join("Lib"), &bin.join("Lib"))?;
        copy_tree(&ctx.source_dir.join("Include"), &bin.join("Include"))?;
        Ok(())
    }

    fn build_unix(&self, ctx: &BuildContext<'_>) -> Result<()> {
        let mut configure = ctx
            .command(ctx.source_dir.join("configure"))
            .arg(format!("--prefix={}", ctx.install_dir.display()))
            .arg("--enable-shared");
        if ctx.mode == crate::mode::BuildMode::Debug {
            configure = configure.arg("--with-pydebug");
        }
        ctx.run("python", configure)?;
        ctx.run("python", ctx.command("make"))?;
        ctx.run("python", ctx.command("make").arg("install"))?;
        Ok(())
    }
}

/// Extract `major.minor` from `Python 3.11.5`
pub fn parse_version(text: &str) -> Option<String> {
    let (_, number) = text.trim().split_once(' ')?;
    let mut parts = number.trim().split('.');
    let major = parts.next().filter(|s| !s.is_empty())?;
    let minor = parts.next().filter(|s| !s.is_empty())?;
    Some(format!("{}.{}", major, minor))
}

impl BuildProcedure for PythonProcedure {
    fn name(&self) -> &str {
        "python"
    }

    fn marker(&self, ctx: &BuildContext<'_>) -> Option<PathBuf> {
        Some(Self::executable(ctx))
    }

    fn build(&self, _entry: &PackageEntry, ctx: &BuildContext<'_>) -> Result<()> {
        info!("Building Python from {}", ctx.source_dir.display());
        match ctx.os {
            TargetOs::Windows => self.build_windows(ctx),
            TargetOs::Unix => self.build_unix(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::BuildMode;
    use crate::pipeline::ToolPaths;
    use crate::process::{RecordingRunner, ToolOutput};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("Python 3.11.5\n"), Some("3.11".to_string()));
        assert_eq!(parse_version("Python 3.12.0rc1"), Some("3.12".to_string()));
        assert_eq!(parse_version("garbage"), None);
    }

    #[test]
    fn test_windows_build_copies_output() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("python");
        for dir in ["PCbuild/amd64", "Lib", "Include"] {
            fs::create_dir_all(src.join(dir)).unwrap();
        }
        fs::write(src.join("PCbuild/amd64/python.exe"), "exe").unwrap();
        fs::write(src.join("Lib/os.py"), "").unwrap();
        fs::write(src.join("Include/Python.h"), "").unwrap();
        let out = temp.path().join("out");

        let tools = ToolPaths::default();
        let runner = RecordingRunner::new();
        let ctx = BuildContext::new(BuildMode::Release, &out, &src, &tools, &runner)
            .with_os(TargetOs::Windows)
            .with_arch(Some(HostArch::X86_64));

        PythonProcedure.build(&PackageEntry::new("python"), &ctx).unwrap();

        let calls = runner.calls();
        assert_eq!(calls[0].program, src.join("PCbuild").join("build.bat"));
        assert_eq!(calls[0].args, vec!["-p", "x64", "-c", "Release"]);
        assert!(out.join("bin/python.exe").exists());
        assert!(out.join("bin/Lib/os.py").exists());
        assert!(out.join("bin/Include/Python.h").exists());
    }

    #[test]
    fn test_unix_build_sequence() {
        let temp = TempDir::new().unwrap();
        let tools = ToolPaths::default();
        let runner = RecordingRunner::new();
        let ctx = BuildContext::new(BuildMode::Debug, temp.path().join("out"), temp.path(), &tools, &runner)
            .with_os(TargetOs::Unix);

        PythonProcedure.build(&PackageEntry::new("python"), &ctx).unwrap();

        let calls = runner.calls();
        assert_eq!(calls.len(), 3);
        assert!(calls[0].args[0].starts_with("--prefix="));
        assert!(calls[0].args.contains(&"--with-pydebug".to_string()));
        assert_eq!(calls[2].args, vec!["install"]);
    }

    #[test]
    fn test_version_from_interpreter() {
        let tools = ToolPaths::default();
        let runner = RecordingRunner::with_handler(|_| Ok(ToolOutput::ok("Python 3.11.9\n")));
        let ctx = BuildContext::new(BuildMode::Release, "/out", "/src", &tools, &runner)
            .with_os(TargetOs::Windows);

        assert_eq!(PythonProcedure::version(&ctx).unwrap(), "3.11");
        assert_eq!(
            runner.calls()[0].program,
            PathBuf::from("/out").join("bin").join("python.exe")
        );
    }
}
