use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::Level;

/// The command line interface for the RFID gateway.
#[derive(Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to a configuration file
    pub config: Option<PathBuf>,

    /// Port to listen on. Overrides the configuration file.
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Log level for stdout.
    #[arg(long, default_value_t = Level::INFO)]
    pub log_level: Level,

    /// Also log to daily rotated files in this directory.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subcommands
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Commands available in the command line interface.
#[derive(Subcommand)]
pub enum Commands {
    /// Examples for user convenience.
    #[clap(subcommand)]
    Examples(Examples),
}

/// Helpful examples for users.
#[derive(Subcommand, Clone)]
pub enum Examples {
    /// Show an example of a configuration file's contents.
    Config,

    /// Show an example JSON message of tags, as sent over the websocket and by `/last-read`.
    Tags,

    /// Show an example JSON response of `/state`.
    State,
}
