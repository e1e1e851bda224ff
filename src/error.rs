use miette::Diagnostic;
use thiserror::Error;

use crate::session::DisplaySessionState;

#[derive(Debug, Error, Diagnostic)]
pub enum PortholeError {
    #[error("failed to load config from {path}")]
    ConfigLoad {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config from {path}: {message}")]
    ConfigParse { path: String, message: String },

    #[error("validation error: {message}")]
    Validation { message: String },

    /// Malformed display configuration string. Not retryable.
    #[error("invalid display configuration: {message}")]
    Format { message: String },

    #[error("no SPICE viewer found, install virt-viewer (remote-viewer) or spice-gtk (spicy)")]
    ViewerNotFound,

    /// The resolved viewer cannot express the requested transport. No
    /// fallback viewer is attempted.
    #[error("viewer {viewer}: {message}")]
    UnsupportedTransport { viewer: String, message: String },

    #[error("display session already started")]
    AlreadyStarted,

    #[error("display session not initialized")]
    NotInitialized,

    #[error("native display surface failed in state {state:?}: {message}")]
    Surface {
        state: DisplaySessionState,
        message: String,
    },

    /// Command-surface check failed before the core was invoked.
    #[error("{message}")]
    Preflight { message: String },

    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}
