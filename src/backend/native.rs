//! Embedded hypervisor display driver.
//!
//! Shows the VM console in a window owned by the embedded hypervisor
//! framework. Only macOS hosts carry that framework; elsewhere the driver
//! still constructs (with a headless surface) and simply reports no GUI
//! capability, so callers get a clean capability verdict instead of a
//! construction failure.

use tokio::sync::mpsc;

use super::{Driver, DriverInfo, Features};
use crate::config::SystemConfig;
use crate::error::PortholeError;
use crate::session::{
    DEFAULT_HEIGHT, DEFAULT_WIDTH, DisplaySessionController, DisplaySessionState, DisplaySurface,
    HeadlessSurface, SessionConfig, SessionEvent,
};

pub struct NativeDriver {
    controller: DisplaySessionController,
    supported: bool,
}

impl NativeDriver {
    pub fn new(
        surface: Box<dyn DisplaySurface>,
        supported: bool,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            controller: DisplaySessionController::new(surface, events),
            supported,
        }
    }

    /// Compose for the current host. The machine runner swaps in the
    /// framework-backed surface when embedding for real.
    pub fn with_platform_defaults(events: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self::new(
            Box::new(HeadlessSurface),
            cfg!(target_os = "macos"),
            events,
        )
    }

    pub fn controller(&self) -> &DisplaySessionController {
        &self.controller
    }

    pub fn session_state(&self) -> DisplaySessionState {
        self.controller.state()
    }
}

impl Driver for NativeDriver {
    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: "native",
            features: Features {
                can_run_gui: self.supported,
            },
        }
    }

    async fn show_display(&self, sys_config: &SystemConfig) -> Result<(), PortholeError> {
        let display = &sys_config.config.display;
        let config = SessionConfig {
            width: display.width.unwrap_or(DEFAULT_WIDTH),
            height: display.height.unwrap_or(DEFAULT_HEIGHT),
        };

        if self.controller.has_session() {
            self.controller.bring_to_foreground()
        } else {
            self.controller.start(config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, tests::test_system_config};

    fn native_sys_config() -> crate::config::SystemConfig {
        let toml = r#"
[display]
mode = "native"
"#;
        let config: Config = facet_toml::from_str(toml).unwrap();
        test_system_config(config)
    }

    #[tokio::test]
    async fn show_starts_then_foregrounds() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let driver = NativeDriver::new(Box::new(HeadlessSurface), true, tx);
        let sys = native_sys_config();

        driver.show_display(&sys).await.unwrap();
        assert_eq!(driver.session_state(), DisplaySessionState::Created);

        // Second show finds the session and raises it instead of restarting.
        driver.show_display(&sys).await.unwrap();
        assert_eq!(driver.session_state(), DisplaySessionState::Visible);
    }

    #[tokio::test]
    async fn show_after_close_fails_as_misuse() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let driver = NativeDriver::new(Box::new(HeadlessSurface), true, tx);
        let sys = native_sys_config();

        driver.show_display(&sys).await.unwrap();
        driver.controller().handle_close();

        let err = driver.show_display(&sys).await.unwrap_err();
        assert!(matches!(err, PortholeError::AlreadyStarted));
    }
}
