//! Time-boxed subprocess execution behind a seam the tests can script.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

/// Outcome of one probe or repair command.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// The process ran to completion.
    Finished {
        success: bool,
        stdout: String,
        stderr: String,
    },
    /// The executable could not be spawned (typically: not installed).
    Missing,
    /// The command exceeded its time box and was killed.
    TimedOut,
}

impl RunOutcome {
    pub fn success(&self) -> bool {
        matches!(self, RunOutcome::Finished { success: true, .. })
    }

    pub fn stdout(&self) -> &str {
        match self {
            RunOutcome::Finished { stdout, .. } => stdout,
            _ => "",
        }
    }

    /// Short human-readable description for error messages.
    pub fn describe(&self) -> String {
        match self {
            RunOutcome::Finished { success: true, .. } => "succeeded".into(),
            RunOutcome::Finished { stderr, .. } if !stderr.trim().is_empty() => {
                format!("exited with failure: {}", stderr.trim())
            }
            RunOutcome::Finished { .. } => "exited with failure".into(),
            RunOutcome::Missing => "command not found".into(),
            RunOutcome::TimedOut => "timed out".into(),
        }
    }
}

/// Seam between the readiness logic and the guest system.
///
/// All probes and repairs go through this trait so unit tests can script
/// every outcome without touching the host.
#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Runner {
    /// Resolve an executable name on `PATH`.
    fn lookup(&self, name: &str) -> Option<PathBuf>;

    /// Run a command to completion, bounded by `timeout`.
    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> RunOutcome;
}

/// Runs commands against the real guest system.
pub struct SystemRunner;

impl Runner for SystemRunner {
    fn lookup(&self, name: &str) -> Option<PathBuf> {
        let paths = std::env::var_os("PATH")?;
        std::env::split_paths(&paths)
            .map(|dir| dir.join(name))
            .find(|candidate| candidate.is_file())
    }

    async fn run(&self, program: &str, args: &[&str], timeout: Duration) -> RunOutcome {
        let child = tokio::process::Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();

        let child = match child {
            Ok(child) => child,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return RunOutcome::Missing,
            Err(e) => {
                tracing::debug!("failed to spawn {program}: {e}");
                return RunOutcome::Missing;
            }
        };

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Err(_) => {
                tracing::debug!("{program} exceeded its {timeout:?} time box");
                RunOutcome::TimedOut
            }
            Ok(Err(e)) => RunOutcome::Finished {
                success: false,
                stdout: String::new(),
                stderr: e.to_string(),
            },
            Ok(Ok(output)) => RunOutcome::Finished {
                success: output.status.success(),
                stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            },
        }
    }
}
