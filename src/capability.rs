//! Read-side status composition for the command surface.

use facet::Facet;

use crate::backend::DriverInfo;
use crate::config::{DisplayMode, SystemConfig};
use crate::session::{DEFAULT_HEIGHT, DEFAULT_WIDTH, DisplaySessionState};

/// Snapshot of what the display configuration and drivers currently allow.
/// Derived on demand, never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
#[facet(rename_all = "camelCase")]
pub struct CapabilitySnapshot {
    pub display_enabled: bool,
    pub can_run_gui: bool,
    pub clipboard_shared: bool,
    pub resolution: Option<String>,
    pub audio_enabled: bool,
}

/// Compose a snapshot from declared configuration plus (when available) the
/// live driver capability and session state. Pure composition: no side
/// effects, safe to call repeatedly and concurrently.
pub fn snapshot(
    sys_config: &SystemConfig,
    driver: Option<&DriverInfo>,
    session: Option<DisplaySessionState>,
) -> CapabilitySnapshot {
    let config = &sys_config.config;
    let mode = config.display_mode();
    let display_enabled = mode != DisplayMode::None;

    // Driver capability, refined by session liveness: once the native
    // window has stopped, the machine is going down with it.
    let can_run_gui = driver.map(|info| info.features.can_run_gui).unwrap_or(false)
        && session != Some(DisplaySessionState::Stopped);

    // Explicit configuration wins; the implicit default is on only for an
    // enabled native display.
    let clipboard_shared = match config.display.disable_clipboard {
        Some(disabled) => !disabled,
        None => display_enabled && mode == DisplayMode::Native,
    };

    let resolution = match (config.display.width, config.display.height) {
        (Some(width), Some(height)) => Some(format!("{width}x{height}")),
        _ if mode == DisplayMode::Native => Some(format!("{DEFAULT_WIDTH}x{DEFAULT_HEIGHT}")),
        _ => None,
    };

    CapabilitySnapshot {
        display_enabled,
        can_run_gui,
        clipboard_shared,
        resolution,
        audio_enabled: config.audio_enabled(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Features;
    use crate::config::{Config, tests::test_system_config};

    fn native_config() -> Config {
        let toml = r#"
[display]
mode = "native"
"#;
        facet_toml::from_str(toml).unwrap()
    }

    fn info(can_run_gui: bool) -> DriverInfo {
        DriverInfo {
            name: "native",
            features: Features { can_run_gui },
        }
    }

    #[test]
    fn native_defaults() {
        let sys = test_system_config(native_config());
        let snapshot = snapshot(&sys, Some(&info(true)), None);

        assert!(snapshot.display_enabled);
        assert!(snapshot.can_run_gui);
        assert!(snapshot.clipboard_shared);
        assert_eq!(snapshot.resolution.as_deref(), Some("1920x1200"));
        assert!(!snapshot.audio_enabled);
    }

    #[test]
    fn disabled_display_shares_nothing() {
        let sys = test_system_config(Config::default());
        let snapshot = snapshot(&sys, Some(&info(true)), None);

        assert!(!snapshot.display_enabled);
        assert!(!snapshot.clipboard_shared);
        assert_eq!(snapshot.resolution, None);
    }

    #[test]
    fn explicit_clipboard_override_wins() {
        let mut config = native_config();
        config.display.disable_clipboard = Some(true);
        let sys = test_system_config(config);

        assert!(!snapshot(&sys, Some(&info(true)), None).clipboard_shared);
    }

    #[test]
    fn configured_resolution_wins_over_default() {
        let mut config = native_config();
        config.display.width = Some(2560);
        config.display.height = Some(1440);
        let sys = test_system_config(config);

        assert_eq!(
            snapshot(&sys, Some(&info(true)), None).resolution.as_deref(),
            Some("2560x1440")
        );
    }

    #[test]
    fn spice_mode_has_no_implicit_clipboard_or_resolution() {
        let toml = r#"
[display]
mode = "spice"
spice = "spice,port=5930"
"#;
        let sys = test_system_config(facet_toml::from_str(toml).unwrap());
        let snapshot = snapshot(&sys, Some(&info(true)), None);

        assert!(snapshot.display_enabled);
        assert!(!snapshot.clipboard_shared);
        assert_eq!(snapshot.resolution, None);
    }

    #[test]
    fn stopped_session_withdraws_gui_capability() {
        let sys = test_system_config(native_config());

        assert!(snapshot(&sys, Some(&info(true)), Some(DisplaySessionState::Visible)).can_run_gui);
        assert!(!snapshot(&sys, Some(&info(true)), Some(DisplaySessionState::Stopped)).can_run_gui);
        assert!(!snapshot(&sys, None, None).can_run_gui);
    }
}
