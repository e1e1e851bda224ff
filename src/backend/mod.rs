pub mod native;
pub mod spice;

use tokio::sync::mpsc;

use crate::config::{DisplayMode, SystemConfig};
use crate::error::PortholeError;
use crate::session::SessionEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    pub can_run_gui: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverInfo {
    pub name: &'static str,
    pub features: Features,
}

#[allow(async_fn_in_trait)] // trait is internal-only
pub trait Driver {
    fn info(&self) -> DriverInfo;
    async fn show_display(&self, sys_config: &SystemConfig) -> Result<(), PortholeError>;
}

/// Driver selected from the configured display mode.
pub enum AnyDriver {
    Native(native::NativeDriver),
    Spice(spice::SpiceDriver),
}

pub fn create_driver(
    sys_config: &SystemConfig,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> AnyDriver {
    match sys_config.config.display_mode() {
        DisplayMode::Spice => AnyDriver::Spice(spice::SpiceDriver),
        DisplayMode::Native | DisplayMode::None => {
            AnyDriver::Native(native::NativeDriver::with_platform_defaults(events))
        }
    }
}

impl Driver for AnyDriver {
    fn info(&self) -> DriverInfo {
        match self {
            AnyDriver::Native(driver) => driver.info(),
            AnyDriver::Spice(driver) => driver.info(),
        }
    }

    async fn show_display(&self, sys_config: &SystemConfig) -> Result<(), PortholeError> {
        match self {
            AnyDriver::Native(driver) => driver.show_display(sys_config).await,
            AnyDriver::Spice(driver) => driver.show_display(sys_config).await,
        }
    }
}
