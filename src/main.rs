use std::path::Path;

use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use porthole::backend::{self, AnyDriver, Driver};
use porthole::capability::{self, CapabilitySnapshot};
use porthole::cli::{Cli, Command, OutputFormat};
use porthole::config::{self, DisplayMode, SystemConfig};
use porthole::error::PortholeError;
use porthole::instance::{self, Instance, InstanceStatus};
use porthole::paths;
use porthole_agent::GuiInfo;

#[tokio::main]
async fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("porthole=info".parse().expect("valid log directive"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let sys_config = config::load_config(&cli.config)?;

    match cli.command {
        Command::Show => show(&sys_config).await?,
        Command::Status { guest_status } => {
            status(&sys_config, guest_status.as_deref(), cli.output)?
        }
    }

    Ok(())
}

/// Open the display for a running instance.
///
/// The preflight checks are caller-sequencing guards, reported as their own
/// failures before any core display machinery runs. A broken guest clipboard
/// never blocks the display from opening; clipboard state is not consulted
/// here at all.
async fn show(sys_config: &SystemConfig) -> Result<(), PortholeError> {
    let Some(inst) = instance::inspect(sys_config) else {
        return Err(PortholeError::Preflight {
            message: format!(
                "instance '{}' does not exist, start it with your machine runner first",
                sys_config.display_name()
            ),
        });
    };

    if inst.status != InstanceStatus::Running {
        return Err(PortholeError::Preflight {
            message: format!(
                "instance '{}' is not running (status: {})",
                inst.name, inst.status
            ),
        });
    }

    if sys_config.config.display_mode() == DisplayMode::None {
        return Err(PortholeError::Preflight {
            message: format!("display is not enabled for instance '{}'", inst.name),
        });
    }

    // The machine supervisor would own this receiver in an embedded run;
    // window-close events stop the machine through it.
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let driver = backend::create_driver(sys_config, events_tx);
    let info = driver.info();
    if !info.features.can_run_gui {
        return Err(PortholeError::Preflight {
            message: format!(
                "GUI is not supported for instance '{}' (driver: {}, display: {})",
                inst.name, info.name, sys_config.config.display.mode
            ),
        });
    }

    tracing::info!("opening display for instance '{}'", inst.name);
    driver.show_display(sys_config).await
}

fn status(
    sys_config: &SystemConfig,
    guest_status: Option<&Path>,
    output: OutputFormat,
) -> Result<(), PortholeError> {
    let inst = instance::inspect(sys_config);

    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let driver = backend::create_driver(sys_config, events_tx);
    let session = match &driver {
        AnyDriver::Native(native) => Some(native.session_state()),
        AnyDriver::Spice(_) => None,
    };
    let snapshot = capability::snapshot(sys_config, Some(&driver.info()), session);

    let guest = read_guest_status(sys_config, guest_status);

    match output {
        OutputFormat::Json => print_status_json(sys_config, inst.as_ref(), &snapshot, guest),
        OutputFormat::Text => print_status_text(sys_config, inst.as_ref(), &snapshot, guest),
    }

    Ok(())
}

/// Best-effort read of the document the guest agent exports. Absence or a
/// malformed file just means "no guest report yet".
fn read_guest_status(sys_config: &SystemConfig, path: Option<&Path>) -> Option<GuiInfo> {
    let default_path;
    let path = match path {
        Some(path) => path,
        None => {
            default_path =
                paths::guest_status_file(&sys_config.id, sys_config.name.as_deref());
            &default_path
        }
    };

    let contents = std::fs::read_to_string(path).ok()?;
    match facet_json::from_str(&contents) {
        Ok(info) => Some(info),
        Err(e) => {
            tracing::debug!("ignoring malformed guest status {}: {e}", path.display());
            None
        }
    }
}

fn print_status_text(
    sys_config: &SystemConfig,
    inst: Option<&Instance>,
    snapshot: &CapabilitySnapshot,
    guest: Option<GuiInfo>,
) {
    match inst {
        Some(inst) => println!("Instance '{}': {}", inst.name, inst.status),
        None => println!("Instance '{}': not created", sys_config.display_name()),
    }

    let display = if snapshot.display_enabled {
        format!("{} (enabled)", sys_config.config.display.mode)
    } else {
        "none".to_string()
    };
    println!("  Display:    {display}");
    println!(
        "  GUI:        {}",
        if snapshot.can_run_gui { "supported" } else { "unsupported" }
    );
    if let Some(resolution) = &snapshot.resolution {
        println!("  Resolution: {resolution}");
    }
    println!(
        "  Clipboard:  {}",
        if snapshot.clipboard_shared { "shared" } else { "not shared" }
    );
    println!(
        "  Audio:      {}",
        if snapshot.audio_enabled { "enabled" } else { "disabled" }
    );

    if let Some(guest) = guest {
        if guest.clipboard.clipboard_ready {
            println!("  Guest clipboard: ready");
        } else {
            println!("  Guest clipboard: not ready ({})", guest.clipboard.error_message);
        }
    }
}

fn print_status_json(
    sys_config: &SystemConfig,
    inst: Option<&Instance>,
    snapshot: &CapabilitySnapshot,
    guest: Option<GuiInfo>,
) {
    let doc = StatusJson {
        name: sys_config.display_name().to_string(),
        status: match inst {
            Some(inst) => inst.status.to_string(),
            None => "NotCreated".to_string(),
        },
        capability: snapshot.clone(),
        guest,
    };
    println!(
        "{}",
        facet_json::to_string(&doc).expect("JSON serialization")
    );
}

// ── JSON output struct ──────────────────────────────────────────────

#[derive(facet::Facet)]
#[facet(rename_all = "camelCase")]
struct StatusJson {
    name: String,
    status: String,
    capability: CapabilitySnapshot,
    guest: Option<GuiInfo>,
}
