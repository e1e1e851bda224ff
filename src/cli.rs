use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "porthole", about = "VM display sessions and host/guest clipboard sharing")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "porthole.toml")]
    pub config: PathBuf,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Open the graphical display for the instance
    Show,

    /// Print display capability and clipboard status
    Status {
        /// Guest status document exported from the guest agent channel
        /// (defaults to the one in the instance work directory)
        #[arg(long)]
        guest_status: Option<PathBuf>,
    },
}
