//! Shared status vocabulary between the guest agent and the host CLI.
//!
//! The JSON form of these structs (camelCase field names) is the contract
//! surfaced from the guest to the host; changing a name here breaks the
//! host-side reader.

use facet::Facet;

/// Clipboard agent daemon (binary and systemd unit name).
pub const AGENT_DAEMON: &str = "spice-vdagentd";
/// Distribution package that ships the agent.
pub const AGENT_PACKAGE: &str = "spice-vdagent";

/// Guest-reported clipboard readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
#[facet(rename_all = "camelCase")]
#[facet(default)]
pub struct ClipboardStatus {
    pub transport_exists: bool,
    pub agent_installed: bool,
    pub agent_running: bool,
    pub clipboard_ready: bool,
    /// Empty exactly when `clipboard_ready` is true; otherwise names every
    /// failing sub-condition in transport, install, run order.
    pub error_message: String,
}

impl ClipboardStatus {
    /// Compose the readiness verdict from the three independent checks.
    pub fn from_checks(transport_exists: bool, agent_installed: bool, agent_running: bool) -> Self {
        let clipboard_ready = transport_exists && agent_installed && agent_running;

        let error_message = if clipboard_ready {
            String::new()
        } else {
            let mut reasons = Vec::new();
            if !transport_exists {
                reasons
                    .push("virtio transport port not found (host display session not configured)");
            }
            if !agent_installed {
                reasons.push("spice-vdagent package not installed");
            }
            if !agent_running {
                reasons.push("spice-vdagentd service not running");
            }
            format!("clipboard sharing not ready: {}", reasons.join("; "))
        };

        Self {
            transport_exists,
            agent_installed,
            agent_running,
            clipboard_ready,
            error_message,
        }
    }

    /// Fixed verdict for guests without the Linux probe surface.
    pub fn unsupported_platform() -> Self {
        Self {
            error_message: "clipboard agent only available on Linux guests".into(),
            ..Self::default()
        }
    }
}

/// Full GUI environment report emitted by `porthole-agent status`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Facet)]
#[facet(rename_all = "camelCase")]
#[facet(default)]
pub struct GuiInfo {
    /// "X11", "Wayland" or "none".
    pub display_server: String,
    pub session_active: bool,
    pub displays: Vec<String>,
    /// Current resolution as "WxH"; empty when undetectable.
    pub resolution: String,
    pub idle_time_ms: u64,
    pub clipboard: ClipboardStatus,
}

impl GuiInfo {
    pub fn unsupported_platform() -> Self {
        Self {
            display_server: "none".into(),
            clipboard: ClipboardStatus::unsupported_platform(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ready_is_conjunction_of_all_checks() {
        for transport in [false, true] {
            for installed in [false, true] {
                for running in [false, true] {
                    let status = ClipboardStatus::from_checks(transport, installed, running);
                    assert_eq!(status.clipboard_ready, transport && installed && running);
                    assert_eq!(status.error_message.is_empty(), status.clipboard_ready);
                }
            }
        }
    }

    #[test]
    fn error_message_lists_failing_checks_in_order() {
        let status = ClipboardStatus::from_checks(true, false, false);
        assert!(!status.error_message.contains("transport"));
        let installed_at = status.error_message.find("not installed").unwrap();
        let running_at = status.error_message.find("not running").unwrap();
        assert!(installed_at < running_at);
    }

    #[test]
    fn error_message_mentions_transport_first() {
        let status = ClipboardStatus::from_checks(false, false, true);
        let transport_at = status.error_message.find("transport port not found").unwrap();
        let installed_at = status.error_message.find("not installed").unwrap();
        assert!(transport_at < installed_at);
    }

    #[test]
    fn unsupported_platform_is_not_ready() {
        let status = ClipboardStatus::unsupported_platform();
        assert!(!status.clipboard_ready);
        assert!(status.error_message.contains("Linux"));
    }
}
