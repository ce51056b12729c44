//! Export sinks for rendered client configurations.
//!
//! The compiler hands each rendered artifact to an [`ExportSink`] together
//! with a deterministic file name. [`FileExportSink`] writes into a
//! directory; [`MemoryExportSink`] keeps artifacts in memory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, PoisonError};

use async_trait::async_trait;
use regex::Regex;

use crate::error::{ExportError, ExportResult};
use crate::models::{ClientConfigFormat, ClientConfiguration};

/// Where an exported artifact ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportLocation {
    /// Written to a file
    File(PathBuf),
    /// Kept in memory under this name
    Memory(String),
}

impl fmt::Display for ExportLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory(name) => write!(f, "memory:{name}"),
        }
    }
}

/// Destination for exported artifacts
#[async_trait]
pub trait ExportSink: Send + Sync {
    /// Stores `content` under `filename`
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::Failed`] if the artifact could not be stored.
    async fn write(&self, filename: &str, content: &str) -> ExportResult<ExportLocation>;
}

static UNSAFE_FILENAME_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9._-]").expect("UNSAFE_FILENAME_CHARS is a valid regex pattern")
});

/// File name for an exported configuration: `{protocol}_{address}_{port}.{ext}`
#[must_use]
pub fn export_filename(config: &ClientConfiguration, format: ClientConfigFormat) -> String {
    let address = UNSAFE_FILENAME_CHARS.replace_all(&config.server_address, "_");
    format!(
        "{}_{}_{}.{}",
        config.protocol_type,
        address,
        config.port,
        format.extension()
    )
}

/// Writes artifacts into a directory, creating it on first use
#[derive(Debug, Clone)]
pub struct FileExportSink {
    directory: PathBuf,
}

impl FileExportSink {
    /// Creates a sink writing into `directory`
    #[must_use]
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }

    /// Target directory
    #[must_use]
    pub fn directory(&self) -> &std::path::Path {
        &self.directory
    }
}

#[async_trait]
impl ExportSink for FileExportSink {
    async fn write(&self, filename: &str, content: &str) -> ExportResult<ExportLocation> {
        tokio::fs::create_dir_all(&self.directory)
            .await
            .map_err(|e| {
                ExportError::Failed(format!(
                    "cannot create {}: {e}",
                    self.directory.display()
                ))
            })?;
        let path = self.directory.join(filename);
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| ExportError::Failed(format!("cannot write {}: {e}", path.display())))?;
        Ok(ExportLocation::File(path))
    }
}

/// Keeps artifacts in a shared map
#[derive(Debug, Clone, Default)]
pub struct MemoryExportSink {
    artifacts: Arc<Mutex<BTreeMap<String, String>>>,
}

impl MemoryExportSink {
    /// Creates an empty sink
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Content stored under `filename`
    #[must_use]
    pub fn get(&self, filename: &str) -> Option<String> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(filename)
            .cloned()
    }

    /// Stored file names in order
    #[must_use]
    pub fn filenames(&self) -> Vec<String> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }

    /// Whether nothing was exported yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

#[async_trait]
impl ExportSink for MemoryExportSink {
    async fn write(&self, filename: &str, content: &str) -> ExportResult<ExportLocation> {
        self.artifacts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(filename.to_string(), content.to_string());
        Ok(ExportLocation::Memory(filename.to_string()))
    }
}
