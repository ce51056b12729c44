//! CLI error types and exit codes.

use vpstools_core::{CompileError, ConfigError, ExportError, FleetError};

/// Exit codes for CLI operations
pub mod exit_codes {
    /// General error - configuration, validation, or other non-connection errors
    pub const GENERAL_ERROR: i32 = 1;
    /// Connection failure - a probe failed or an instance could not be reached
    pub const CONNECTION_FAILURE: i32 = 2;
}

/// CLI error type
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration or persistence error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Instance not found
    #[error("VPS instance not found: {0}")]
    InstanceNotFound(String),

    /// Client configuration not found
    #[error("Client configuration not found: {0}")]
    ConfigurationNotFound(String),

    /// Invalid user input
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Connection test failed
    #[error("Connection test failed: {0}")]
    TestFailed(String),

    /// Connection error
    #[error("Connection error: {0}")]
    Connection(String),

    /// Telemetry collection error
    #[error("Telemetry error: {0}")]
    Telemetry(String),

    /// Rendering error
    #[error("Render error: {0}")]
    Render(String),

    /// Export error
    #[error("Export error: {0}")]
    Export(String),

    /// Import error
    #[error("Import error: {0}")]
    Import(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<FleetError> for CliError {
    fn from(err: FleetError) -> Self {
        match err {
            FleetError::ConnectionFailed(reason) => Self::Connection(reason),
            FleetError::NotConnected(_) => Self::Connection(err.to_string()),
            FleetError::NotFound(id) => Self::InstanceNotFound(id.to_string()),
            FleetError::InvalidConfiguration(reason) => Self::Validation(reason),
            FleetError::DuplicateService { .. } => Self::Validation(err.to_string()),
            FleetError::Collection(e) => Self::Telemetry(e.to_string()),
        }
    }
}

impl From<CompileError> for CliError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::UnknownConfiguration(id) => Self::ConfigurationNotFound(id.to_string()),
            CompileError::MalformedUri(_) => Self::Import(err.to_string()),
            other => Self::Render(other.to_string()),
        }
    }
}

impl From<ExportError> for CliError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Render(e) => e.into(),
            ExportError::Failed(reason) => Self::Export(reason),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl CliError {
    /// Returns the appropriate exit code for this error type.
    ///
    /// Exit codes:
    /// - 0: Success (not an error)
    /// - 1: General error (configuration, validation, render, export, IO)
    /// - 2: Connection failure (probe failed, instance unreachable or not found)
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::TestFailed(_) | Self::InstanceNotFound(_) | Self::Connection(_) => {
                exit_codes::CONNECTION_FAILURE
            }
            Self::Config(_)
            | Self::ConfigurationNotFound(_)
            | Self::Validation(_)
            | Self::Telemetry(_)
            | Self::Render(_)
            | Self::Export(_)
            | Self::Import(_)
            | Self::Io(_) => exit_codes::GENERAL_ERROR,
        }
    }
}
