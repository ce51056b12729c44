//! Configuration management for VPSTools
//!
//! This module provides the `ConfigManager` for locating the configuration
//! directory and loading and saving `settings.toml`.

mod manager;
pub mod settings;

pub use manager::{CONFIG_DIR_ENV, ConfigManager, SETTINGS_FILE_NAME};
pub use settings::{AppSettings, ExportSettings, LoggingSettings, ProbeSettings, SshSettings};
