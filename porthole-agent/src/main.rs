use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::signal::unix::{SignalKind, signal};
use tracing_subscriber::EnvFilter;

use porthole_agent::GuiInfo;

mod clipboard;
mod gui;
mod runner;

use clipboard::ClipboardSupervisor;
use runner::{Runner, SystemRunner};

#[derive(Parser, Debug)]
#[command(name = "porthole-agent", about = "Guest-side display and clipboard agent")]
struct Cli {
    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the GUI and clipboard status document as JSON
    Status,

    /// Install and start the clipboard agent if it is not ready
    Ensure,

    /// Poll status and self-heal the clipboard agent
    Serve {
        /// Seconds between polls
        #[arg(long, default_value_t = 30)]
        interval: u64,

        /// Write each status document to this file for the host channel
        #[arg(long)]
        status_file: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
            .add_directive("porthole_agent=info".parse().expect("valid log directive"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let supervisor = ClipboardSupervisor::new(SystemRunner);

    match cli.command {
        Command::Status => {
            let info = collect(&SystemRunner, &supervisor).await;
            println!(
                "{}",
                facet_json::to_string(&info).expect("JSON serialization")
            );
        }
        Command::Ensure => {
            if let Err(e) = supervisor.ensure_ready().await {
                tracing::error!("clipboard repair failed: {e}");
                std::process::exit(1);
            }
        }
        Command::Serve {
            interval,
            status_file,
        } => serve(supervisor, interval, status_file).await,
    }
}

/// Build the full status document, degrading to the fixed stub on guests
/// without the Linux probe surface.
async fn collect<R: Runner>(runner: &R, supervisor: &ClipboardSupervisor<R>) -> GuiInfo {
    if !cfg!(target_os = "linux") {
        return GuiInfo::unsupported_platform();
    }
    let clipboard = supervisor.detect().await;
    gui::detect(runner, clipboard).await
}

/// Poll loop: detect, self-heal at most once per cycle, export the document.
async fn serve(
    supervisor: ClipboardSupervisor<SystemRunner>,
    interval: u64,
    status_file: Option<PathBuf>,
) {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");
    let mut ticker = tokio::time::interval(Duration::from_secs(interval.max(1)));

    tracing::info!(interval, "porthole-agent serving");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let mut info = collect(&SystemRunner, &supervisor).await;

                if info.clipboard.transport_exists && !info.clipboard.clipboard_ready {
                    tracing::info!("virtio transport detected, attempting to enable clipboard sharing");
                    // At most one repair per cycle; the repair sequence is
                    // not safe to run concurrently for the same guest.
                    match supervisor.ensure_ready().await {
                        Ok(()) => info = collect(&SystemRunner, &supervisor).await,
                        Err(e) => tracing::warn!("clipboard repair failed: {e}"),
                    }
                }

                if let Some(path) = &status_file {
                    match facet_json::to_string(&info) {
                        Ok(doc) => {
                            if let Err(e) = tokio::fs::write(path, doc).await {
                                tracing::warn!("failed to write status file {}: {e}", path.display());
                            }
                        }
                        Err(e) => tracing::warn!("failed to serialize status document: {e}"),
                    }
                }
            }
            _ = sigterm.recv() => break,
            _ = sigint.recv() => break,
        }
    }

    tracing::info!("porthole-agent stopping");
}
