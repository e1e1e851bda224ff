use std::path::{Path, PathBuf};

use facet::Facet;

use crate::error::PortholeError;

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct DisplayConfig {
    /// Display mode: "none", "native" (embedded hypervisor window) or
    /// "spice" (external viewer).
    #[facet(default = "none")]
    pub mode: String,

    /// Window dimensions. Both or neither; native mode falls back to
    /// 1920x1200 when unset.
    pub width: Option<u32>,
    pub height: Option<u32>,

    /// Overrides the implicit clipboard-sharing default.
    pub disable_clipboard: Option<bool>,

    /// SPICE display configuration string, e.g. "spice,port=5930" or
    /// "spice+unix:///run/vm/spice.sock". Required in spice mode.
    #[facet(default)]
    pub spice: String,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            mode: "none".into(),
            width: None,
            height: None,
            disable_clipboard: None,
            spice: String::new(),
        }
    }
}

#[derive(Debug, Clone, Facet)]
#[facet(default)]
pub struct AudioConfig {
    /// Audio device: "none" disables audio.
    #[facet(default = "none")]
    pub device: String,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device: "none".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Facet)]
#[facet(default)]
pub struct Config {
    #[facet(default)]
    pub display: DisplayConfig,
    #[facet(default)]
    pub audio: AudioConfig,
}

/// The configured display backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    None,
    Native,
    Spice,
}

impl Config {
    /// The validated display mode. `load_config` rejects anything else.
    pub fn display_mode(&self) -> DisplayMode {
        match self.display.mode.as_str() {
            "native" => DisplayMode::Native,
            "spice" => DisplayMode::Spice,
            _ => DisplayMode::None,
        }
    }

    pub fn audio_enabled(&self) -> bool {
        !self.audio.device.is_empty() && self.audio.device != "none"
    }
}

/// A loaded config plus the identity derived from its path.
#[derive(Debug, Clone)]
pub struct SystemConfig {
    /// 8-hex-char id derived from the canonical config path (+ name).
    pub id: String,
    /// Instance name derived from the config filename, if any.
    pub name: Option<String>,
    pub config_path: PathBuf,
    pub config: Config,
}

impl SystemConfig {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("default")
    }
}

fn validate_config(config: &Config) -> Result<(), PortholeError> {
    match config.display.mode.as_str() {
        "none" | "native" | "spice" => {}
        other => {
            return Err(PortholeError::Validation {
                message: format!(
                    "display.mode must be one of none, native, spice (got '{other}')"
                ),
            });
        }
    }

    if config.display.mode == "spice" && config.display.spice.is_empty() {
        return Err(PortholeError::Validation {
            message: "display.spice connection string is required when display.mode = \"spice\""
                .into(),
        });
    }

    if config.display.width.is_some() != config.display.height.is_some() {
        return Err(PortholeError::Validation {
            message: "display.width and display.height must be set together".into(),
        });
    }

    if let (Some(width), Some(height)) = (config.display.width, config.display.height) {
        if width == 0 || height == 0 {
            return Err(PortholeError::Validation {
                message: "display dimensions must be non-zero".into(),
            });
        }
    }

    Ok(())
}

fn validate_name(name: &str) -> Result<(), PortholeError> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) => {
            first.is_ascii_alphanumeric()
                && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
        }
        None => false,
    };
    if !valid {
        return Err(PortholeError::Validation {
            message: format!("derived name must match [a-zA-Z0-9][a-zA-Z0-9._-]* (got '{name}')"),
        });
    }
    Ok(())
}

// ── helpers ───────────────────────────────────────────────

/// Derive the instance name from the config filename.
/// `porthole.toml` → None, `dev.porthole.toml` → Some("dev")
fn derive_name(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_str()?;
    if stem == "porthole" {
        return None;
    }
    // For `dev.porthole.toml`, file_stem gives `dev.porthole`, we want `dev`
    let name = stem.strip_suffix(".porthole").unwrap_or(stem);
    Some(name.to_string())
}

/// Compute an 8-hex-char ID from the canonicalized config path and optional
/// name, so configs in different directories never collide.
fn config_id(canonical_path: &Path, name: Option<&str>) -> String {
    let mut hash: u64 = 0xcbf29ce484222325; // FNV-1a offset basis
    for b in canonical_path.to_string_lossy().bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    if let Some(n) = name {
        for b in n.bytes() {
            hash ^= b as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
    }
    format!("{:08x}", hash as u32)
}

// ── public API ────────────────────────────────────────────

pub fn load_config(path: &Path) -> Result<SystemConfig, PortholeError> {
    let contents = std::fs::read_to_string(path).map_err(|source| PortholeError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let config: Config = facet_toml::from_str(&contents).map_err(|e| PortholeError::ConfigParse {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    validate_config(&config)?;

    let canonical = path.canonicalize().map_err(|source| PortholeError::ConfigLoad {
        path: path.display().to_string(),
        source,
    })?;

    let name = derive_name(&canonical);
    if let Some(ref n) = name {
        validate_name(n)?;
    }

    let id = config_id(&canonical, name.as_deref());

    Ok(SystemConfig {
        id,
        name,
        config_path: canonical,
        config,
    })
}
