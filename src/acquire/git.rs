// src/acquire/git.rs

//! Version-control acquisition

use crate::error::{Error, Result};
use crate::process::{Invocation, ToolRunner, run_checked};
use std::path::Path;
use tracing::info;

/// Arguments for the initial `git clone`
///
/// A ref without a hash is cloned shallowly at that ref. A hash needs the
/// full history so the commit can be checked out afterwards. The target
/// directory name is always the final argument.
pub fn clone_args(url: &str, reference: Option<&str>, hash: Option<&str>, name: &str) -> Vec<String> {
    let mut args = vec!["clone".to_string(), "--recurse-submodules".to_string()];

    if hash.is_none() {
        args.extend(["--shallow-submodules", "--depth", "1"].map(String::from));
    }
    if let Some(reference) = reference {
        args.push("--branch".to_string());
        args.push(reference.to_string());
    }

    args.push(url.to_string());
    args.push(name.to_string());
    args
}

/// Clone `url` into `parent/name`, then move to `hash` if one is given
pub fn clone(
    runner: &dyn ToolRunner,
    git: &Path,
    parent: &Path,
    name: &str,
    url: &str,
    reference: Option<&str>,
    hash: Option<&str>,
) -> Result<()> {
    let failed = |output: &crate::process::ToolOutput| Error::CloneFailed {
        url: url.to_string(),
        reference: reference.or(hash).map(String::from),
        output: output.combined(),
    };

    info!(
        "Cloning {}{} into {}",
        url,
        reference.map(|r| format!(" at {}", r)).unwrap_or_default(),
        parent.join(name).display()
    );

    let clone = Invocation::new(git, parent)
        .args(clone_args(url, reference, hash, name))
        .env("GIT_TERMINAL_PROMPT", "0");
    run_checked(runner, &clone, failed)?;

    if let Some(hash) = hash {
        let repo = parent.join(name);
        info!("Checking out {} in {}", hash, name);

        let checkout = Invocation::new(git, &repo).args(["checkout", hash]);
        run_checked(runner, &checkout, failed)?;

        let submodules =
            Invocation::new(git, &repo).args(["submodule", "update", "--init", "--recursive"]);
        run_checked(runner, &submodules, failed)?;
    }

    Ok(())
}
