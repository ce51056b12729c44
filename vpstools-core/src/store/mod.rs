//! Persistence of the fleet roster and the configuration catalog.
//!
//! Both live in a single versioned JSON document. Writes go to a temporary
//! file in the same directory and are renamed into place, so a crash never
//! leaves a truncated roster behind.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::models::{ClientConfiguration, VpsInstance};
use crate::trace_operation_debug;
use crate::tracing::span_names;

/// Current version of the fleet document
pub const FLEET_DOCUMENT_VERSION: u32 = 1;

/// File name of the fleet document inside the configuration directory
pub const FLEET_FILE_NAME: &str = "fleet.json";

/// Persisted state: roster plus catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FleetDocument {
    /// Format version
    pub version: u32,
    /// When the document was written
    pub saved_at: DateTime<Utc>,
    /// Fleet roster
    #[serde(default)]
    pub instances: Vec<VpsInstance>,
    /// Client configuration catalog
    #[serde(default)]
    pub configurations: Vec<ClientConfiguration>,
}

impl Default for FleetDocument {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

impl FleetDocument {
    /// Creates a document at the current version
    #[must_use]
    pub fn new(instances: Vec<VpsInstance>, configurations: Vec<ClientConfiguration>) -> Self {
        Self {
            version: FLEET_DOCUMENT_VERSION,
            saved_at: Utc::now(),
            instances,
            configurations,
        }
    }

    /// Whether the document holds nothing
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instances.is_empty() && self.configurations.is_empty()
    }
}

/// Reads and writes the fleet document
#[derive(Debug, Clone)]
pub struct FleetStore {
    path: PathBuf,
}

impl FleetStore {
    /// Creates a store for the document at `path`
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Creates a store for `fleet.json` inside `dir`
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(FLEET_FILE_NAME))
    }

    /// Path of the document
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document; a missing file yields an empty document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] for unreadable
    /// files and [`ConfigError::UnsupportedVersion`] for documents written by
    /// a newer version.
    pub fn load(&self) -> ConfigResult<FleetDocument> {
        #[derive(Deserialize)]
        struct VersionCheck {
            version: u32,
        }

        let _span = trace_operation_debug!(span_names::STORE_LOAD).entered();

        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "No fleet document yet");
                return Ok(FleetDocument::default());
            }
            Err(source) => {
                return Err(ConfigError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let parse_error = |e: serde_json::Error| ConfigError::Parse {
            path: self.path.clone(),
            reason: e.to_string(),
        };
        let check: VersionCheck = serde_json::from_str(&json).map_err(parse_error)?;
        if check.version > FLEET_DOCUMENT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: check.version,
                supported: FLEET_DOCUMENT_VERSION,
            });
        }

        let document: FleetDocument = serde_json::from_str(&json).map_err(parse_error)?;
        tracing::debug!(
            instances = document.instances.len(),
            configurations = document.configurations.len(),
            "Fleet document loaded"
        );
        Ok(document)
    }

    /// Writes the document atomically
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Serialize`] or [`ConfigError::Io`].
    pub fn save(&self, document: &FleetDocument) -> ConfigResult<()> {
        let _span = trace_operation_debug!(span_names::STORE_SAVE).entered();

        let json = serde_json::to_string_pretty(document)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        let io_error = |path: &Path| {
            let path = path.to_path_buf();
            move |source: std::io::Error| ConfigError::Io { path, source }
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_error(parent))?;
        }
        let temp = self.path.with_extension("json.tmp");
        fs::write(&temp, json).map_err(io_error(&temp))?;
        fs::rename(&temp, &self.path).map_err(io_error(&self.path))?;

        tracing::debug!(path = %self.path.display(), "Fleet document saved");
        Ok(())
    }
}
