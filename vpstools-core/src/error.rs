//! Error types for VPSTools
//!
//! Every public operation on the fleet coordinator, the configuration
//! compiler and the export adapter returns one of the errors below.
//! None of them leave shared state partially mutated.

use std::path::PathBuf;

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ClientAppType, ClientConfigFormat, ProtocolType};
use crate::session::SessionError;
use crate::telemetry::CollectionError;

/// Errors raised by the fleet coordinator
#[derive(Debug, Error)]
pub enum FleetError {
    /// Reachability or authentication failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The submitted draft or patch is malformed
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Telemetry was requested without a prior successful session
    #[error("Instance {0} has no successful SSH session; run a connection test first")]
    NotConnected(Uuid),

    /// No instance with the given ID exists in the roster
    #[error("VPS instance not found: {0}")]
    NotFound(Uuid),

    /// A service with the same ID already exists on the instance
    #[error("Service '{service_id}' already exists on instance {vps_id}")]
    DuplicateService {
        /// Instance the service was appended to
        vps_id: Uuid,
        /// Conflicting service ID
        service_id: String,
    },

    /// Telemetry collection failed as a whole
    #[error(transparent)]
    Collection(#[from] CollectionError),
}

/// Result type alias for fleet operations
pub type FleetResult<T> = std::result::Result<T, FleetError>;

/// Errors raised while rendering client configurations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    /// No configuration with the given ID is in the catalog
    #[error("Unknown configuration: {0}")]
    UnknownConfiguration(Uuid),

    /// No configuration in the catalog references the instance
    #[error("No configurations registered for instance {0}")]
    NoConfigurations(Uuid),

    /// A field required by the protocol is absent
    #[error("Missing field '{field}' required by {protocol}")]
    MissingField {
        /// Protocol of the configuration
        protocol: ProtocolType,
        /// Name of the missing field
        field: &'static str,
    },

    /// The format/app pair is not in the supported matrix
    #[error("Unsupported combination: format '{format}' with app '{app}'")]
    UnsupportedCombination {
        /// Requested output format
        format: ClientConfigFormat,
        /// Requested client application
        app: ClientAppType,
    },

    /// The protocol cannot be expressed in the requested target
    #[error("Unsupported protocol '{protocol}' for {target}")]
    UnsupportedProtocol {
        /// Protocol identifier as given
        protocol: String,
        /// Target that rejected it (URI scheme, client app)
        target: String,
    },

    /// A configuration with this ID is already registered
    #[error("Configuration already registered: {0}")]
    DuplicateConfiguration(Uuid),

    /// A share link could not be parsed
    #[error("Malformed URI: {0}")]
    MalformedUri(String),

    /// Document serialization failed
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Result type alias for compiler operations
pub type CompileResult<T> = std::result::Result<T, CompileError>;

/// Errors raised by `export_config` and export sinks
#[derive(Debug, Error)]
pub enum ExportError {
    /// Rendering failed before anything was written
    #[error(transparent)]
    Render(#[from] CompileError),

    /// The sink could not store the artifact
    #[error("Export failed: {0}")]
    Failed(String),
}

/// Result type alias for export operations
pub type ExportResult<T> = std::result::Result<T, ExportError>;

/// Errors raised by settings and fleet persistence
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Reading or writing a file failed
    #[error("I/O error at {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A file could not be parsed
    #[error("Failed to parse {path}: {reason}")]
    Parse {
        /// File that failed
        path: PathBuf,
        /// Parser message
        reason: String,
    },

    /// State could not be serialized
    #[error("Failed to serialize: {0}")]
    Serialize(String),

    /// The fleet document was written by a newer version
    #[error("Unsupported fleet document version {found} (supported up to {supported})")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Highest version this build understands
        supported: u32,
    },

    /// No configuration directory could be determined
    #[error("Could not determine a configuration directory")]
    NoConfigDir,
}

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Umbrella error for callers that want a single type
#[derive(Debug, Error)]
pub enum VpsToolsError {
    /// Fleet coordinator error
    #[error(transparent)]
    Fleet(#[from] FleetError),

    /// Compiler error
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Export error
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Settings or persistence error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Session error
    #[error(transparent)]
    Session(#[from] SessionError),
}
