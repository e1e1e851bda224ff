//! Lifecycle of the native display window bound to one running VM.
//!
//! One controller exists per running machine and owns its window state
//! exclusively. The embedded framework stops the machine when its window is
//! closed; that coupling is a framework contract and is surfaced here as the
//! irreversible `Stopped` state plus a `SessionEvent::Closed` notification
//! to the machine supervisor.

use std::sync::Mutex;

use tokio::sync::mpsc;

use crate::error::PortholeError;

pub const DEFAULT_WIDTH: u32 = 1920;
pub const DEFAULT_HEIGHT: u32 = 1200;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplaySessionState {
    Uninitialized,
    Created,
    Visible,
    Hidden,
    /// Terminal. Reaching it also stops the machine; a machine restart
    /// constructs a fresh controller.
    Stopped,
}

/// Events surfaced to the machine supervisor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The window was closed; the machine must shut down with it.
    Closed,
}

/// Window dimensions for a native display session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

/// Seam to the embedded hypervisor's windowing layer.
///
/// The machine runner injects the framework-backed implementation when
/// embedding; `HeadlessSurface` stands in everywhere else.
pub trait DisplaySurface: Send {
    fn create(&mut self, width: u32, height: u32) -> Result<(), String>;
    fn focus(&mut self) -> Result<(), String>;
}

/// Surface for hosts without native windowing (and for tests). All
/// operations succeed without side effects.
pub struct HeadlessSurface;

impl DisplaySurface for HeadlessSurface {
    fn create(&mut self, width: u32, height: u32) -> Result<(), String> {
        tracing::debug!(width, height, "headless surface created");
        Ok(())
    }

    fn focus(&mut self) -> Result<(), String> {
        Ok(())
    }
}

struct Inner {
    state: DisplaySessionState,
    surface: Box<dyn DisplaySurface>,
}

pub struct DisplaySessionController {
    // Single mutual-exclusion point: a foreground request may race a close
    // callback fired by the framework.
    inner: Mutex<Inner>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl DisplaySessionController {
    pub fn new(
        surface: Box<dyn DisplaySurface>,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: DisplaySessionState::Uninitialized,
                surface,
            }),
            events,
        }
    }

    /// Create the native window. Legal exactly once per controller lifetime.
    pub fn start(&self, config: SessionConfig) -> Result<(), PortholeError> {
        let mut inner = self.inner.lock().expect("session lock");
        match inner.state {
            DisplaySessionState::Uninitialized => {
                if let Err(message) = inner.surface.create(config.width, config.height) {
                    return Err(PortholeError::Surface {
                        state: DisplaySessionState::Uninitialized,
                        message,
                    });
                }
                inner.state = DisplaySessionState::Created;
                Ok(())
            }
            _ => Err(PortholeError::AlreadyStarted),
        }
    }

    /// Raise the window. No-op success when already frontmost.
    pub fn bring_to_foreground(&self) -> Result<(), PortholeError> {
        let mut inner = self.inner.lock().expect("session lock");
        match inner.state {
            DisplaySessionState::Uninitialized | DisplaySessionState::Stopped => {
                Err(PortholeError::NotInitialized)
            }
            DisplaySessionState::Visible => Ok(()),
            DisplaySessionState::Created | DisplaySessionState::Hidden => {
                let state = inner.state;
                if let Err(message) = inner.surface.focus() {
                    return Err(PortholeError::Surface { state, message });
                }
                inner.state = DisplaySessionState::Visible;
                Ok(())
            }
        }
    }

    /// Inbound framework event: the window became visible.
    pub fn handle_show(&self) {
        let mut inner = self.inner.lock().expect("session lock");
        if matches!(
            inner.state,
            DisplaySessionState::Created | DisplaySessionState::Hidden
        ) {
            inner.state = DisplaySessionState::Visible;
        }
    }

    /// Inbound framework event: the window was minimized or occluded.
    pub fn handle_hide(&self) {
        let mut inner = self.inner.lock().expect("session lock");
        if inner.state == DisplaySessionState::Visible {
            inner.state = DisplaySessionState::Hidden;
        }
    }

    /// Inbound framework event: the window was closed.
    ///
    /// Unconditional transition to `Stopped`; the framework stops the
    /// machine with the window, so the supervisor is notified to propagate
    /// the shutdown. Irreversible for this controller.
    pub fn handle_close(&self) {
        let mut inner = self.inner.lock().expect("session lock");
        if inner.state == DisplaySessionState::Stopped {
            return;
        }
        inner.state = DisplaySessionState::Stopped;
        // The supervisor may already be shutting down; a closed channel is fine.
        let _ = self.events.send(SessionEvent::Closed);
    }

    /// Whether a window currently exists. Callers use this to pick between
    /// `start` and `bring_to_foreground` without tracking state themselves.
    pub fn has_session(&self) -> bool {
        matches!(
            self.state(),
            DisplaySessionState::Created | DisplaySessionState::Visible | DisplaySessionState::Hidden
        )
    }

    pub fn state(&self) -> DisplaySessionState {
        self.inner.lock().expect("session lock").state
    }
}
