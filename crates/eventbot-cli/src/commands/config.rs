//! Configuration commands.

use crate::config::BotConfig;
use crate::error::{CliError, CliResult};

/// Dump the effective configuration to stdout.
pub fn dump(config: &BotConfig) -> CliResult<()> {
    let toml_str = toml::to_string_pretty(config)
        .map_err(|e| CliError::config(format!("failed to serialize config: {e}")))?;
    println!("# config.toml ({})", BotConfig::default_path().display());
    println!("{toml_str}");
    Ok(())
}

/// Validate the configuration.
pub fn validate(config: &BotConfig) -> CliResult<()> {
    config.validate()?;
    println!("Configuration is valid.");
    Ok(())
}

/// Show the configuration file path.
pub fn path() -> CliResult<()> {
    println!("config: {}", BotConfig::default_path().display());
    Ok(())
}
