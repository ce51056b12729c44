//! Configuration directory management.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::settings::AppSettings;
use crate::error::{ConfigError, ConfigResult};
use crate::store::FleetStore;

/// Environment variable overriding the configuration directory
pub const CONFIG_DIR_ENV: &str = "VPSTOOLS_CONFIG_DIR";

/// Settings file name inside the configuration directory
pub const SETTINGS_FILE_NAME: &str = "settings.toml";

const APP_DIR_NAME: &str = "vpstools";

/// Resolves the configuration directory and the files inside it
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Uses `VPSTOOLS_CONFIG_DIR` if set, otherwise the platform directory
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoConfigDir`] if neither is available.
    pub fn new() -> ConfigResult<Self> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
            return Ok(Self::with_config_dir(PathBuf::from(dir)));
        }
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::with_config_dir(dir.join(APP_DIR_NAME)))
    }

    /// Uses an explicit directory
    #[must_use]
    pub fn with_config_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Configuration directory
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Path of `settings.toml`
    #[must_use]
    pub fn settings_path(&self) -> PathBuf {
        self.config_dir.join(SETTINGS_FILE_NAME)
    }

    /// Store for the persisted fleet document
    #[must_use]
    pub fn fleet_store(&self) -> FleetStore {
        FleetStore::in_dir(&self.config_dir)
    }

    /// Loads settings; a missing file yields defaults
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`].
    pub fn load_settings(&self) -> ConfigResult<AppSettings> {
        let path = self.settings_path();
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(AppSettings::default()),
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path,
            reason: e.to_string(),
        })
    }

    /// Writes settings, creating the directory if needed
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] or [`ConfigError::Io`].
    pub fn save_settings(&self, settings: &AppSettings) -> ConfigResult<()> {
        let content =
            toml::to_string_pretty(settings).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::create_dir_all(&self.config_dir).map_err(|source| ConfigError::Io {
            path: self.config_dir.clone(),
            source,
        })?;
        let path = self.settings_path();
        fs::write(&path, content).map_err(|source| ConfigError::Io { path, source })
    }

    /// Export directory from settings, or `<data_dir>/vpstools/exports`
    #[must_use]
    pub fn export_dir(&self, settings: &AppSettings) -> PathBuf {
        settings.export.directory.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .map_or_else(|| self.config_dir.clone(), |d| d.join(APP_DIR_NAME))
                .join("exports")
        })
    }
}
