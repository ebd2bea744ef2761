// src/inhibit.rs

//! Keeps the machine awake while a long build runs
//!
//! The guard spawns a platform helper that holds an idle-sleep inhibition
//! for as long as it lives. Dropping the guard ends the helper, so the
//! inhibition ends on every exit path, including errors.
//!
//! On Linux the lock is held by `systemd-inhibit cat`, reading a pipe owned
//! by the guard. Closing that pipe ends `cat` and with it the lock, so no
//! process outlives the guard.

use std::process::{Child, Command, Stdio};
use std::time::Duration;
use tracing::{debug, warn};
use wait_timeout::ChildExt;

/// How long a helper gets to exit after its stdin closes before it is killed
const RELEASE_GRACE: Duration = Duration::from_secs(2);

/// The platform's inhibitor helper
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InhibitorCommand {
    pub program: String,
    pub args: Vec<String>,
    /// The helper exits once its stdin reaches end of file
    pub releases_on_eof: bool,
}

/// The platform's inhibitor helper, if it has one
pub fn inhibitor_command(reason: &str) -> Option<InhibitorCommand> {
    if cfg!(target_os = "linux") {
        Some(InhibitorCommand {
            program: "systemd-inhibit".to_string(),
            args: vec![
                "--what=idle:sleep".to_string(),
                "--who=libpack".to_string(),
                format!("--why={}", reason),
                "cat".to_string(),
            ],
            releases_on_eof: true,
        })
    } else if cfg!(target_os = "macos") {
        Some(InhibitorCommand {
            program: "caffeinate".to_string(),
            args: vec!["-i".to_string(), "-w".to_string(), std::process::id().to_string()],
            releases_on_eof: false,
        })
    } else {
        None
    }
}

/// Scoped idle-sleep inhibition
#[derive(Debug)]
pub struct SleepInhibitor {
    child: Option<Child>,
}

impl SleepInhibitor {
    /// Start inhibiting sleep
    ///
    /// Never fails: a missing or broken helper is logged and the guard
    /// does nothing.
    pub fn acquire(reason: &str) -> Self {
        let Some(command) = inhibitor_command(reason) else {
            debug!("No sleep inhibitor on this platform");
            return Self::disabled();
        };
        Self::spawn(&command)
    }

    fn spawn(command: &InhibitorCommand) -> Self {
        let stdin = if command.releases_on_eof {
            Stdio::piped()
        } else {
            Stdio::null()
        };

        match Command::new(&command.program)
            .args(&command.args)
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
        {
            Ok(child) => {
                debug!("Inhibiting sleep via {} (pid {})", command.program, child.id());
                Self { child: Some(child) }
            }
            Err(e) => {
                warn!("Could not start {} to prevent sleep: {}", command.program, e);
                Self::disabled()
            }
        }
    }

    /// A guard that holds nothing
    pub fn disabled() -> Self {
        Self { child: None }
    }

    pub fn is_active(&self) -> bool {
        self.child.is_some()
    }
}

impl Drop for SleepInhibitor {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            let exited = match child.stdin.take() {
                Some(stdin) => {
                    drop(stdin);
                    matches!(child.wait_timeout(RELEASE_GRACE), Ok(Some(_)))
                }
                None => false,
            };
            if !exited {
                if let Err(e) = child.kill() {
                    debug!("Sleep inhibitor already gone: {}", e);
                }
                let _ = child.wait();
            }
            debug!("Sleep inhibition released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_guard() {
        let guard = SleepInhibitor::disabled();
        assert!(!guard.is_active());
        drop(guard);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_linux_command() {
        let command = inhibitor_command("Building LibPack").unwrap();
        assert_eq!(command.program, "systemd-inhibit");
        assert!(command.args.contains(&"--why=Building LibPack".to_string()));
        assert_eq!(command.args.last().unwrap(), "cat");
        assert!(command.releases_on_eof);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_drop_ends_lock_holder_started_by_helper() {
        // The outer shell stands in for systemd-inhibit; the inner one records
        // its pid and becomes the `cat` holding the lock
        let temp = tempfile::TempDir::new().unwrap();
        let pid_file = temp.path().join("holder.pid");
        let script = format!(
            "sh -c 'echo $$ > {}; exec cat'; true",
            pid_file.display()
        );
        let guard = SleepInhibitor::spawn(&InhibitorCommand {
            program: "sh".to_string(),
            args: vec!["-c".to_string(), script],
            releases_on_eof: true,
        });
        assert!(guard.is_active());

        let mut holder = String::new();
        for _ in 0..100 {
            holder = std::fs::read_to_string(&pid_file).unwrap_or_default();
            if !holder.trim().is_empty() {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        let proc_dir = std::path::PathBuf::from(format!("/proc/{}", holder.trim()));
        assert!(proc_dir.exists());

        drop(guard);
        assert!(!proc_dir.exists());
    }

    #[test]
    fn test_acquire_never_fails() {
        // Whether or not the helper exists, acquiring and dropping is safe
        let guard = SleepInhibitor::acquire("test");
        drop(guard);
    }
}
