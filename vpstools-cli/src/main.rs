//! `VPSTools` CLI - Command-line interface for the `VPSTools` fleet manager
//!
//! Provides commands for adding, testing and inspecting VPS instances,
//! registering deployed services, and rendering, printing and exporting
//! proxy client configurations.

mod cli;
mod commands;
mod error;
mod util;

use clap::Parser;
use cli::Cli;
use vpstools_core::tracing::{TracingConfig, TracingLevel, init_tracing};

fn main() {
    let cli = Cli::parse();
    let config_path = cli.config.as_deref();

    let base = util::create_config_manager(config_path)
        .ok()
        .and_then(|manager| manager.load_settings().ok())
        .map_or(TracingLevel::Warn, |settings| settings.logging.tracing_level());
    let level = TracingLevel::from_verbosity(base, cli.verbose, cli.quiet);
    if let Err(e) = init_tracing(&TracingConfig::new().with_level(level)) {
        if !cli.quiet {
            eprintln!("Warning: failed to initialize logging: {e}");
        }
    }

    let result = commands::dispatch(config_path, cli.command);

    if let Err(e) = result {
        if !cli.quiet {
            eprintln!("Error: {e}");
        }
        std::process::exit(e.exit_code());
    }
}
