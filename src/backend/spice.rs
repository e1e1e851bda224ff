//! Protocol display driver: each show launches an external viewer.
//!
//! There is no session to track here; the viewer process owns its own
//! window and may outlive us.

use super::{Driver, DriverInfo, Features};
use crate::config::SystemConfig;
use crate::descriptor::ConnectionDescriptor;
use crate::error::PortholeError;
use crate::viewer;

pub struct SpiceDriver;

impl Driver for SpiceDriver {
    fn info(&self) -> DriverInfo {
        DriverInfo {
            name: "spice",
            // Viewer availability is checked at launch time, not here.
            features: Features { can_run_gui: true },
        }
    }

    async fn show_display(&self, sys_config: &SystemConfig) -> Result<(), PortholeError> {
        let descriptor = ConnectionDescriptor {
            audio: sys_config.config.audio_enabled(),
            ..ConnectionDescriptor::parse(&sys_config.config.display.spice)?
        };

        viewer::launch_viewer(&descriptor).await
    }
}
