//! eventbot CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use tracing::Level;

use eventbot_cli::cli::{Cli, Command, ConfigAction};
use eventbot_cli::config::BotConfig;
use eventbot_cli::error::CliResult;
use eventbot_core::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = match cli.config {
        Some(ref path) => BotConfig::load_from(path)?,
        None => BotConfig::load()?,
    };

    let tracing = if cli.debug || config.debug {
        TracingConfig::cli_debug()
    } else if cli.json_logs {
        TracingConfig::service()
    } else {
        TracingConfig::default().with_level(Level::WARN)
    };
    init_tracing(tracing)?;

    match cli.command {
        Some(Command::Config { ref action }) => match action {
            ConfigAction::Dump => eventbot_cli::commands::config::dump(&config),
            ConfigAction::Validate => eventbot_cli::commands::config::validate(&config),
            ConfigAction::Path => eventbot_cli::commands::config::path(),
        },
        Some(Command::Run) | None => eventbot_cli::commands::run::run(&cli, &config).await,
    }
}
