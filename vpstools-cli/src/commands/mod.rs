//! Command handler modules for the CLI.

mod completions;
mod config;
mod service;
mod vps;

use std::path::Path;

use crate::cli::Commands;
use crate::error::CliError;

/// Dispatch a CLI command to the appropriate handler.
pub fn dispatch(config_path: Option<&Path>, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Vps(subcmd) => vps::cmd_vps(config_path, subcmd),
        Commands::Service(subcmd) => service::cmd_service(config_path, subcmd),
        Commands::Config(subcmd) => config::cmd_config(config_path, subcmd),
        Commands::Completions { shell } => completions::cmd_completions(shell),
    }
}
