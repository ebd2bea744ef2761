// src/process.rs

//! External process plumbing
//!
//! Every external tool (git, the archiver, cmake, package build scripts) is
//! run through the [`ToolRunner`] trait with an explicit argument vector and
//! working directory. Nothing in the crate relies on the process-wide
//! current directory.
//!
//! [`SystemRunner`] starts each tool as the leader of its own process group
//! (a `taskkill /T` tree on Windows), so a timeout ends everything the tool
//! started, not only the tool itself.

use crate::error::{Error, Result};
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};
use tracing::debug;
use wait_timeout::ChildExt;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

/// How long output pipes may stay open after the tool exits
///
/// A descendant that inherited stdout (a backgrounded helper, a build
/// server left running) keeps the pipe open; its output is not waited for.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// A single external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub env: Vec<(String, String)>,
}

impl Invocation {
    pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.into(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Program name without its directory, for messages
    pub fn program_name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }

    /// Shell-like rendering for logs
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

/// Captured result of an external command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` if the process was killed by a signal
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// A successful run with the given stdout
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: Some(0),
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// A failed run with the given exit code and stderr
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stdout followed by stderr
    pub fn combined(&self) -> String {
        match (self.stdout.is_empty(), self.stderr.is_empty()) {
            (_, true) => self.stdout.clone(),
            (true, false) => self.stderr.clone(),
            (false, false) => format!("{}\n{}", self.stdout.trim_end(), self.stderr),
        }
    }
}

/// Runs external commands
///
/// Implementations return `Ok` for any process that ran to completion,
/// whatever its exit status; callers map a non-zero status onto their own
/// error variant. `Err` means the process could not be run at all or timed
/// out.
pub trait ToolRunner: Send + Sync {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput>;
}

/// Runs commands on the host
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill any process that runs longer than `timeout`
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Background reader for one of a child's output pipes
struct Drain {
    buf: Arc<Mutex<Vec<u8>>>,
    done: Receiver<()>,
}

impl Drain {
    fn spawn<R: Read + Send + 'static>(pipe: Option<R>) -> Self {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let (tx, done) = mpsc::channel();
        let sink = Arc::clone(&buf);

        thread::spawn(move || {
            if let Some(mut pipe) = pipe {
                let mut chunk = [0u8; 8192];
                loop {
                    match pipe.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            if let Ok(mut buf) = sink.lock() {
                                buf.extend_from_slice(&chunk[..n]);
                            }
                        }
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
            }
            let _ = tx.send(());
        });

        Self { buf, done }
    }

    /// Everything read until end of file, or until `deadline` passes
    fn collect(self, deadline: Instant) -> String {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if self.done.recv_timeout(remaining).is_err() {
            debug!("Output pipe still held open by a descendant process, not waiting for it");
        }
        let bytes = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

/// Kill `child` and every process in its group, then reap it
fn kill_tree(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;

        // The child leads its own group, so the group id is its pid
        if let Err(e) = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL) {
            debug!("Failed to kill process group {}: {}", child.id(), e);
        }
    }

    #[cfg(windows)]
    {
        let status = Command::new("taskkill")
            .args(["/T", "/F", "/PID", &child.id().to_string()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        if let Err(e) = status {
            debug!("Failed to run taskkill for {}: {}", child.id(), e);
        }
    }

    let _ = child.kill();
    let _ = child.wait();
}

impl ToolRunner for SystemRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        debug!("Running {} in {}", invocation.display(), invocation.cwd.display());

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .envs(invocation.env.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| Error::ToolFailed {
            program: invocation.program.display().to_string(),
            reason: e.to_string(),
        })?;

        // Read both pipes concurrently so a chatty build cannot fill one and block
        let stdout = Drain::spawn(child.stdout.take());
        let stderr = Drain::spawn(child.stderr.take());

        let status = match self.timeout {
            Some(limit) => match child.wait_timeout(limit)? {
                Some(status) => status,
                None => {
                    kill_tree(&mut child);
                    return Err(Error::Timeout {
                        program: invocation.program_name(),
                        seconds: limit.as_secs(),
                    });
                }
            },
            None => child.wait()?,
        };

        let deadline = Instant::now() + DRAIN_GRACE;
        Ok(ToolOutput {
            code: status.code(),
            stdout: stdout.collect(deadline),
            stderr: stderr.collect(deadline),
        })
    }
}

type Handler = dyn Fn(&Invocation) -> Result<ToolOutput> + Send + Sync;

/// Test double that records invocations instead of spawning processes
///
/// By default every command succeeds with empty output. A handler can be
/// installed to script results or to fake side effects such as the
/// directory a clone would create.
pub struct RecordingRunner {
    calls: Mutex<Vec<Invocation>>,
    handler: Option<Box<Handler>>,
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: None,
        }
    }

    /// Answer every invocation with `handler`
    pub fn with_handler<F>(handler: F) -> Self
    where
        F: Fn(&Invocation) -> Result<ToolOutput> + Send + Sync + 'static,
    {
        Self {
            calls: Mutex::new(Vec::new()),
            handler: Some(Box::new(handler)),
        }
    }

    /// Every invocation so far, in call order
    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Invocations whose program file name equals `name`
    pub fn calls_to(&self, name: &str) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program_name() == name)
            .collect()
    }
}

impl ToolRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation) -> Result<ToolOutput> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(invocation.clone());
        }
        match &self.handler {
            Some(handler) => handler(invocation),
            None => Ok(ToolOutput::ok("")),
        }
    }
}

/// Run `invocation` and turn a non-zero exit into `on_failure(output)`
pub fn run_checked<F>(runner: &dyn ToolRunner, invocation: &Invocation, on_failure: F) -> Result<ToolOutput>
where
    F: FnOnce(&ToolOutput) -> Error,
{
    let output = runner.run(invocation)?;
    if !output.success() {
        return Err(on_failure(&output));
    }
    if !output.stdout.is_empty() {
        debug!("{}: {}", invocation.program_name(), output.stdout.trim_end());
    }
    Ok(output)
}

/// Resolve `program` through `PATH`, returning it unchanged if it is already a path
pub fn resolve_program(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 {
        return program.exists().then(|| program.to_path_buf());
    }
    which::which(program).ok()
}
