//! CLI, configuration and console adapter
//!
//! This crate provides the `eventbot` command-line interface.

pub mod cli;
pub mod commands;
pub mod config;
pub mod console;
pub mod error;

pub use cli::Cli;
pub use error::{CliError, CliResult};
