//! VPSTools Core Library
//!
//! This crate provides the core functionality of VPSTools: coordinating a
//! fleet of remote VPS instances and compiling client configurations for the
//! proxy services deployed on them.
//!
//! # Crate Structure
//!
//! - [`models`] - Core data structures (instances, services, client configurations)
//! - [`session`] - Authenticated remote command sessions over the system `ssh` client
//! - [`probe`] - Reachability and credential probes
//! - [`telemetry`] - System telemetry collection and parsing
//! - [`fleet`] - The fleet coordinator
//! - [`compiler`] - sing-box, Clash and share-link rendering
//! - [`export`] - Export sinks for rendered artifacts
//! - [`store`] / [`config`] - Persistence and application settings
//! - [`tracing`] - Structured logging setup

// Enable missing_docs warning for public API documentation
#![warn(missing_docs)]

pub mod compiler;
pub mod config;
pub mod error;
pub mod export;
pub mod fleet;
pub mod models;
pub mod probe;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod tracing;

// =============================================================================
// Convenience re-exports
// =============================================================================

pub use compiler::{ConfigurationCompiler, ProtocolEndpoint};
pub use config::{AppSettings, ConfigManager};
pub use error::{
    CompileError, CompileResult, ConfigError, ConfigResult, ExportError, ExportResult,
    FleetError, FleetResult, VpsToolsError,
};
pub use export::{ExportLocation, ExportSink, FileExportSink, MemoryExportSink, export_filename};
pub use fleet::{DEFAULT_PROBE_CONCURRENCY, FleetCoordinator};
pub use models::labels::{
    app_label, format_label, protocol_label, service_status_label, service_type_label,
};
pub use models::{
    AuthMethod, Bandwidth, ClientAppType, ClientConfigFormat, ClientConfiguration, Credential,
    ProtocolType, ServiceStatus, ServiceType, SystemInfo, TlsConfig, TransportConfig,
    TransportType, VpsDraft, VpsInstance, VpsPatch, VpsService,
};
pub use probe::{
    ConnectionProber, ConnectionTestResult, ProbeOutcome, ProbeSummary, TcpSshProber,
    check_reachable,
};
pub use session::{
    RemoteSession, SessionError, SessionOpener, SshCommandOpener, SshCommandSession, SshOptions,
};
pub use store::{FleetDocument, FleetStore};
pub use telemetry::{CollectionError, ProcTelemetryCollector, TelemetryCollector};
