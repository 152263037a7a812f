//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// eventbot - schedule events from chat and get told when they start
#[derive(Debug, Parser)]
#[command(name = "eventbot")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "EVENTBOT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    /// Log as JSON lines (on stderr)
    #[arg(long)]
    pub json_logs: bool,

    /// Path to the events snapshot
    #[arg(long, env = "EVENTBOT_DATA_FILE")]
    pub data_file: Option<PathBuf>,

    /// Keep events in memory only
    #[arg(long, conflicts_with = "data_file")]
    pub in_memory: bool,

    /// User id console lines are sent as
    #[arg(long)]
    pub user: Option<String>,

    /// Channel id console lines are sent to
    #[arg(long)]
    pub channel: Option<String>,

    /// Show desktop notifications when events start and end
    #[arg(long)]
    pub desktop: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the bot on the console (default)
    Run,

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
