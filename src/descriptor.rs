//! Parsing and serialization of SPICE display configuration strings.
//!
//! Two syntaxes are recognized: the unix-socket form
//! `spice+unix:///path/to/socket` and the comma-separated key=value form
//! `spice,addr=0.0.0.0,port=5930,password=secret`. The wire protocol itself
//! stays opaque here; this module only shuttles connection details between
//! the declarative config and viewer command lines.

use std::path::Path;

use crate::error::PortholeError;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: &str = "5900";

const UNIX_PREFIX: &str = "spice+unix://";
const PROTOCOL_TOKEN: &str = "spice";

/// Parsed SPICE connection configuration.
///
/// Exactly one of (`host` + `port`) or `unix_path` is meaningful. Immutable
/// once parsed; consumed once per viewer launch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    pub host: String,
    pub port: String,
    pub unix_path: String,
    pub password: Option<String>,
    pub audio: bool,
}

impl ConnectionDescriptor {
    /// Parse a display configuration string.
    ///
    /// Unrecognized keys are ignored for forward compatibility; unset `addr`
    /// and `port` fall back to the loopback address and the well-known SPICE
    /// port.
    pub fn parse(display: &str) -> Result<Self, PortholeError> {
        if let Some(path) = display.strip_prefix(UNIX_PREFIX) {
            return Ok(Self {
                unix_path: path.to_string(),
                ..Self::default()
            });
        }

        if !display.starts_with(PROTOCOL_TOKEN) {
            return Err(PortholeError::Format {
                message: format!("unrecognized display string '{display}'"),
            });
        }

        let mut descriptor = Self {
            host: DEFAULT_HOST.into(),
            port: DEFAULT_PORT.into(),
            ..Self::default()
        };

        for part in display.split(',') {
            if part == PROTOCOL_TOKEN {
                continue;
            }
            let Some((key, value)) = part.split_once('=') else {
                continue;
            };
            match (key.trim(), value.trim()) {
                ("port", v) => descriptor.port = v.to_string(),
                ("addr", v) => descriptor.host = v.to_string(),
                ("password", v) => descriptor.password = Some(v.to_string()),
                _ => {}
            }
        }

        Ok(descriptor)
    }

    pub fn is_unix(&self) -> bool {
        !self.unix_path.is_empty()
    }

    /// Derive the connection URI consumed by URI-style viewers.
    ///
    /// Pure transformation, no network I/O.
    pub fn uri(&self) -> Result<String, PortholeError> {
        if self.is_unix() {
            return Ok(format!("{UNIX_PREFIX}{}", self.unix_path));
        }

        if self.host.is_empty() || self.port.is_empty() {
            return Err(PortholeError::Format {
                message: "host and port are required for a network connection".into(),
            });
        }

        let mut uri = format!("spice://{}:{}", self.host, self.port);
        if let Some(password) = &self.password {
            uri.push_str(&format!("?password={password}"));
        }
        Ok(uri)
    }

    /// Build the argument vector for a resolved viewer binary.
    ///
    /// Branches on the viewer executable's name (the resolver only hands
    /// back a path, not a viewer kind). Viewers that cannot express the
    /// requested transport fail instead of silently degrading.
    pub fn viewer_args(&self, viewer: &Path) -> Result<Vec<String>, PortholeError> {
        let name = viewer
            .file_name()
            .map(|f| f.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        if name.contains("remote-viewer") || name.contains("virt-viewer") {
            let mut args = vec![self.uri()?, "--full-screen".to_string()];
            if !self.audio {
                args.push("--spice-disable-audio".to_string());
            }
            Ok(args)
        } else if name.contains("spicy") {
            if self.is_unix() {
                return Err(PortholeError::UnsupportedTransport {
                    viewer: name,
                    message: "Unix socket connections are not supported".into(),
                });
            }

            let mut args = vec![
                "-h".to_string(),
                self.host.clone(),
                "-p".to_string(),
                self.port.clone(),
            ];
            if let Some(password) = &self.password {
                args.push("-w".to_string());
                args.push(password.clone());
            }
            Ok(args)
        } else {
            Err(PortholeError::UnsupportedTransport {
                viewer: name,
                message: "unknown viewer type".into(),
            })
        }
    }
}
