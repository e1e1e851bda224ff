//! Clipboard readiness detection and the ordered repair sequence.
//!
//! Detection is recomputed fresh on every call: guest state changes
//! out-of-band (an operator may install or stop the agent at any time), so a
//! cached verdict would lie. Repair must not run concurrently for the same
//! guest; the serve loop triggers at most one attempt per poll cycle.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use porthole_agent::{AGENT_DAEMON, AGENT_PACKAGE, ClipboardStatus};

use crate::runner::{RunOutcome, Runner};

const PROBE_TIMEOUT: Duration = Duration::from_secs(2);
const INSTALL_TIMEOUT: Duration = Duration::from_secs(60);
const SERVICE_TIMEOUT: Duration = Duration::from_secs(10);
const SETTLE_DELAY: Duration = Duration::from_millis(500);

/// One package-manager repair strategy.
pub struct PackageManager {
    /// Executable whose presence selects this strategy.
    pub probe: &'static str,
    pub install_args: &'static [&'static str],
    pub package: &'static str,
}

/// Ordered fallback table. The first manager whose probe resolves is used
/// exclusively; a failed install surfaces instead of falling through to the
/// next entry (one attempt per run, not a scan of every manager).
pub const PACKAGE_MANAGERS: &[PackageManager] = &[
    PackageManager {
        probe: "apt-get",
        install_args: &["install", "-y"],
        package: AGENT_PACKAGE,
    },
    PackageManager {
        probe: "dnf",
        install_args: &["install", "-y"],
        package: AGENT_PACKAGE,
    },
    PackageManager {
        probe: "yum",
        install_args: &["install", "-y"],
        package: AGENT_PACKAGE,
    },
    PackageManager {
        probe: "zypper",
        install_args: &["install", "-y"],
        package: AGENT_PACKAGE,
    },
    PackageManager {
        probe: "pacman",
        install_args: &["-S", "--noconfirm"],
        package: AGENT_PACKAGE,
    },
];

#[derive(Debug, Error)]
pub enum RepairError {
    /// The transport is provisioned by the host-side display session; no
    /// guest-local action can create it, so this is never retried here.
    #[error("virtio transport port not available (host display session not configured)")]
    TransportAbsent,

    #[error("no supported package manager found to install {package}")]
    NoPackageManager { package: &'static str },

    #[error("{manager} failed to install {package}: {message}")]
    InstallFailed {
        manager: &'static str,
        package: &'static str,
        message: String,
    },

    #[error("failed to start {service}: {message}")]
    StartFailed {
        service: &'static str,
        message: String,
    },

    /// Start reported success but the process never appeared.
    #[error("{service} start reported success but the service is not running")]
    VerificationMismatch { service: &'static str },
}

/// Readiness detector plus self-healing for the guest clipboard agent.
pub struct ClipboardSupervisor<R> {
    runner: R,
    dev_dir: PathBuf,
    virtio_ports_dir: PathBuf,
}

impl<R: Runner> ClipboardSupervisor<R> {
    pub fn new(runner: R) -> Self {
        Self::with_paths(runner, "/dev", "/sys/class/virtio-ports")
    }

    pub fn with_paths(
        runner: R,
        dev_dir: impl Into<PathBuf>,
        virtio_ports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            runner,
            dev_dir: dev_dir.into(),
            virtio_ports_dir: virtio_ports_dir.into(),
        }
    }

    /// Evaluate transport, install and run state and compose the verdict.
    ///
    /// Every probe tolerates partial system information; a missing
    /// directory or absent binary is a negative result, not an error.
    pub async fn detect(&self) -> ClipboardStatus {
        let transport_exists = self.transport_present();
        let agent_installed = self.agent_installed().await;
        // No point scanning the process table when the agent is not even
        // installed; the composite still reports all three fields.
        let agent_running = agent_installed && self.agent_running().await;
        ClipboardStatus::from_checks(transport_exists, agent_installed, agent_running)
    }

    /// Install and start the clipboard agent if it is not ready.
    ///
    /// Idempotent: an already-ready guest returns immediately with no side
    /// effects. The first failing step aborts the rest of the sequence.
    /// Callers bound the whole call by wrapping the future (for example in
    /// `tokio::time::timeout`); each probe carries its own short time box so
    /// one hung check cannot stall the sequence.
    pub async fn ensure_ready(&self) -> Result<(), RepairError> {
        let mut status = self.detect().await;
        if status.clipboard_ready {
            tracing::info!("clipboard agent already configured and running");
            return Ok(());
        }

        if !status.transport_exists {
            return Err(RepairError::TransportAbsent);
        }

        if !status.agent_installed {
            self.install_agent().await?;
            // Fresh verdict: installation may have pulled in a unit that the
            // package scripts already started.
            status = self.detect().await;
        }

        if !status.agent_running {
            self.start_agent().await?;
        }

        Ok(())
    }

    fn transport_present(&self) -> bool {
        if let Ok(entries) = std::fs::read_dir(&self.dev_dir) {
            for entry in entries.flatten() {
                if entry.file_name().to_string_lossy().starts_with("vport") {
                    return true;
                }
            }
        }

        match std::fs::read_dir(&self.virtio_ports_dir) {
            Ok(mut entries) => entries.next().is_some(),
            Err(_) => false,
        }
    }

    async fn agent_installed(&self) -> bool {
        if self.runner.lookup(AGENT_DAEMON).is_some() {
            return true;
        }

        // Package databases as fallback: Debian first, then RPM.
        if self
            .runner
            .run("dpkg", &["-s", AGENT_PACKAGE], PROBE_TIMEOUT)
            .await
            .success()
        {
            return true;
        }
        self.runner
            .run("rpm", &["-q", AGENT_PACKAGE], PROBE_TIMEOUT)
            .await
            .success()
    }

    async fn agent_running(&self) -> bool {
        let outcome = self
            .runner
            .run("systemctl", &["is-active", AGENT_DAEMON], PROBE_TIMEOUT)
            .await;
        if outcome.success() && outcome.stdout().trim() == "active" {
            return true;
        }

        self.runner
            .run("pgrep", &["-x", AGENT_DAEMON], PROBE_TIMEOUT)
            .await
            .success()
    }

    async fn install_agent(&self) -> Result<(), RepairError> {
        let Some(pm) = PACKAGE_MANAGERS
            .iter()
            .find(|pm| self.runner.lookup(pm.probe).is_some())
        else {
            return Err(RepairError::NoPackageManager {
                package: AGENT_PACKAGE,
            });
        };

        tracing::info!(manager = pm.probe, package = pm.package, "installing clipboard agent");

        let mut args: Vec<&str> = pm.install_args.to_vec();
        args.push(pm.package);
        let outcome = self.runner.run(pm.probe, &args, INSTALL_TIMEOUT).await;
        if outcome.success() {
            tracing::info!(manager = pm.probe, "clipboard agent installed");
            Ok(())
        } else {
            Err(RepairError::InstallFailed {
                manager: pm.probe,
                package: pm.package,
                message: outcome.describe(),
            })
        }
    }

    async fn start_agent(&self) -> Result<(), RepairError> {
        // Enabling start-on-boot is best effort; starting is not.
        let enable = self
            .runner
            .run("systemctl", &["enable", AGENT_DAEMON], SERVICE_TIMEOUT)
            .await;
        if !enable.success() {
            tracing::warn!(
                service = AGENT_DAEMON,
                "failed to enable service: {}",
                enable.describe()
            );
        }

        let start = self
            .runner
            .run("systemctl", &["start", AGENT_DAEMON], SERVICE_TIMEOUT)
            .await;
        if !start.success() {
            return Err(RepairError::StartFailed {
                service: AGENT_DAEMON,
                message: start.describe(),
            });
        }

        // Give the unit a moment to fork before judging the result.
        tokio::time::sleep(SETTLE_DELAY).await;
        if !self.agent_running().await {
            return Err(RepairError::VerificationMismatch {
                service: AGENT_DAEMON,
            });
        }

        tracing::info!(service = AGENT_DAEMON, "clipboard agent service started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted stand-in for the guest system. Each command key maps to a
    /// queue of outcomes; the last outcome repeats once the queue drains.
    #[derive(Default)]
    struct FakeRunner {
        on_path: Vec<&'static str>,
        outcomes: HashMap<String, Mutex<Vec<RunOutcome>>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn key(program: &str, args: &[&str]) -> String {
            format!("{program} {}", args.join(" "))
        }

        fn with_binary(mut self, name: &'static str) -> Self {
            self.on_path.push(name);
            self
        }

        fn script(mut self, program: &str, args: &[&str], outcomes: Vec<RunOutcome>) -> Self {
            self.outcomes
                .insert(Self::key(program, args), Mutex::new(outcomes));
            self
        }

        fn succeed(self, program: &str, args: &[&str]) -> Self {
            self.script(program, args, vec![finished(true, "")])
        }

        fn succeed_with(self, program: &str, args: &[&str], stdout: &str) -> Self {
            self.script(program, args, vec![finished(true, stdout)])
        }

        fn fail(self, program: &str, args: &[&str]) -> Self {
            self.script(program, args, vec![finished(false, "")])
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn finished(success: bool, stdout: &str) -> RunOutcome {
        RunOutcome::Finished {
            success,
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    impl Runner for FakeRunner {
        fn lookup(&self, name: &str) -> Option<PathBuf> {
            self.on_path
                .iter()
                .find(|n| **n == name)
                .map(|n| PathBuf::from(format!("/usr/bin/{n}")))
        }

        async fn run(&self, program: &str, args: &[&str], _timeout: Duration) -> RunOutcome {
            let key = Self::key(program, args);
            self.calls.lock().unwrap().push(key.clone());
            match self.outcomes.get(&key) {
                Some(queue) => {
                    let mut queue = queue.lock().unwrap();
                    if queue.len() > 1 {
                        queue.remove(0)
                    } else {
                        queue.first().cloned().unwrap_or(RunOutcome::Missing)
                    }
                }
                None => RunOutcome::Missing,
            }
        }
    }

    struct GuestDirs {
        _dev: tempfile::TempDir,
        _virtio: tempfile::TempDir,
        dev: PathBuf,
        virtio: PathBuf,
    }

    fn guest_dirs(with_vport: bool) -> GuestDirs {
        let dev = tempfile::tempdir().unwrap();
        let virtio = tempfile::tempdir().unwrap();
        if with_vport {
            std::fs::write(dev.path().join("vport2p1"), b"").unwrap();
        }
        let dev_path = dev.path().to_path_buf();
        let virtio_path = virtio.path().to_path_buf();
        GuestDirs {
            _dev: dev,
            _virtio: virtio,
            dev: dev_path,
            virtio: virtio_path,
        }
    }

    fn supervisor(runner: FakeRunner, dirs: &GuestDirs) -> ClipboardSupervisor<FakeRunner> {
        ClipboardSupervisor::with_paths(runner, &dirs.dev, &dirs.virtio)
    }

    #[tokio::test]
    async fn detects_fully_ready_guest() {
        let dirs = guest_dirs(true);
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            .succeed_with("systemctl", &["is-active", AGENT_DAEMON], "active\n");

        let status = supervisor(runner, &dirs).detect().await;
        assert!(status.clipboard_ready);
        assert!(status.error_message.is_empty());
    }

    #[tokio::test]
    async fn transport_via_virtio_ports_directory() {
        let dirs = guest_dirs(false);
        std::fs::write(dirs.virtio.join("com.redhat.spice.0"), b"").unwrap();

        let status = supervisor(FakeRunner::default(), &dirs).detect().await;
        assert!(status.transport_exists);
    }

    #[tokio::test]
    async fn package_database_counts_as_installed() {
        let dirs = guest_dirs(true);
        // Binary not on PATH, dpkg missing, rpm knows the package.
        let runner = FakeRunner::default().succeed("rpm", &["-q", AGENT_PACKAGE]);

        let status = supervisor(runner, &dirs).detect().await;
        assert!(status.agent_installed);
    }

    #[tokio::test]
    async fn pgrep_fallback_counts_as_running() {
        let dirs = guest_dirs(true);
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            .fail("systemctl", &["is-active", AGENT_DAEMON])
            .succeed("pgrep", &["-x", AGENT_DAEMON]);

        let status = supervisor(runner, &dirs).detect().await;
        assert!(status.agent_running);
        assert!(status.clipboard_ready);
    }

    #[tokio::test]
    async fn ensure_ready_is_idempotent() {
        let dirs = guest_dirs(true);
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            .succeed_with("systemctl", &["is-active", AGENT_DAEMON], "active");
        let supervisor = supervisor(runner, &dirs);

        supervisor.ensure_ready().await.unwrap();
        supervisor.ensure_ready().await.unwrap();

        for call in supervisor.runner.calls() {
            assert!(
                !call.contains("install") && !call.contains("systemctl start"),
                "unexpected repair side effect: {call}"
            );
        }
    }

    #[tokio::test]
    async fn absent_transport_fails_before_any_repair() {
        let dirs = guest_dirs(false);
        // Even with a package manager available, nothing must be attempted.
        let runner = FakeRunner::default().with_binary("apt-get");
        let supervisor = supervisor(runner, &dirs);

        let err = supervisor.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RepairError::TransportAbsent));

        for call in supervisor.runner.calls() {
            assert!(
                !call.starts_with("apt-get") && !call.contains("systemctl start"),
                "repair attempted without a transport: {call}"
            );
        }
    }

    #[tokio::test]
    async fn first_resolved_manager_is_used_exclusively() {
        let dirs = guest_dirs(true);
        // dnf and yum both present; dnf resolves first and its failure must
        // surface without yum being consulted.
        let runner = FakeRunner::default()
            .with_binary("dnf")
            .with_binary("yum")
            .fail("dnf", &["install", "-y", AGENT_PACKAGE]);
        let supervisor = supervisor(runner, &dirs);

        let err = supervisor.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RepairError::InstallFailed { manager: "dnf", .. }));

        for call in supervisor.runner.calls() {
            assert!(!call.starts_with("yum"), "fallback manager was tried: {call}");
        }
    }

    #[tokio::test]
    async fn missing_package_manager_is_reported() {
        let dirs = guest_dirs(true);
        let supervisor = supervisor(FakeRunner::default(), &dirs);

        let err = supervisor.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RepairError::NoPackageManager { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn enable_failure_is_tolerated_start_failure_is_not() {
        let dirs = guest_dirs(true);
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            .fail("systemctl", &["is-active", AGENT_DAEMON])
            .fail("systemctl", &["enable", AGENT_DAEMON])
            .fail("systemctl", &["start", AGENT_DAEMON]);
        let supervisor = supervisor(runner, &dirs);

        let err = supervisor.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RepairError::StartFailed { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn start_then_verify_succeeds() {
        let dirs = guest_dirs(true);
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            // inactive before start, active on the post-start verification
            .script(
                "systemctl",
                &["is-active", AGENT_DAEMON],
                vec![finished(false, ""), finished(true, "active\n")],
            )
            .succeed("systemctl", &["enable", AGENT_DAEMON])
            .succeed("systemctl", &["start", AGENT_DAEMON]);

        supervisor(runner, &dirs).ensure_ready().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn silent_start_failure_is_a_distinct_error() {
        let dirs = guest_dirs(true);
        // start succeeds but the service never comes up
        let runner = FakeRunner::default()
            .with_binary(AGENT_DAEMON)
            .fail("systemctl", &["is-active", AGENT_DAEMON])
            .succeed("systemctl", &["enable", AGENT_DAEMON])
            .succeed("systemctl", &["start", AGENT_DAEMON]);
        let supervisor = supervisor(runner, &dirs);

        let err = supervisor.ensure_ready().await.unwrap_err();
        assert!(matches!(err, RepairError::VerificationMismatch { .. }));
    }
}
