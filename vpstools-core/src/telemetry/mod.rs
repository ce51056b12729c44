//! Telemetry collection over an authenticated session.
//!
//! [`ProcTelemetryCollector`] runs a fixed battery of read-only queries,
//! one remote command each, and assembles a [`SystemInfo`]. The first
//! query that fails or does not parse aborts the whole collection.

mod parser;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::SystemInfo;
use crate::session::RemoteSession;

pub use parser::TelemetryParser;

/// Remote commands of the telemetry battery
pub mod queries {
    /// Distribution identification
    pub const OS_RELEASE: &str = "cat /etc/os-release";
    /// Kernel release
    pub const KERNEL: &str = "uname -r";
    /// CPU description
    pub const CPU_INFO: &str = "cat /proc/cpuinfo";
    /// Online CPU count
    pub const CPU_CORES: &str = "nproc";
    /// Memory counters
    pub const MEMINFO: &str = "cat /proc/meminfo";
    /// Root filesystem usage
    pub const DISK: &str = "df -Pk /";
    /// Load averages
    pub const LOADAVG: &str = "cat /proc/loadavg";
    /// Seconds since boot
    pub const UPTIME: &str = "cat /proc/uptime";

    /// All queries in execution order
    pub const ALL: [&str; 8] = [
        OS_RELEASE, KERNEL, CPU_INFO, CPU_CORES, MEMINFO, DISK, LOADAVG, UPTIME,
    ];
}

/// Errors raised while collecting telemetry
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CollectionError {
    /// A remote query could not be executed
    #[error("Telemetry query '{query}' failed: {reason}")]
    Query {
        /// Remote command
        query: String,
        /// Session error text
        reason: String,
    },

    /// A query's output did not have the expected shape
    #[error("Failed to parse output of '{query}': {reason}")]
    Parse {
        /// Remote command
        query: String,
        /// Parser message
        reason: String,
    },
}

/// Collects a [`SystemInfo`] snapshot through a session
#[async_trait]
pub trait TelemetryCollector: Send + Sync {
    /// Runs the battery; never returns a partially filled snapshot
    async fn collect(&self, session: &dyn RemoteSession) -> Result<SystemInfo, CollectionError>;
}

/// Collector for Linux hosts exposing `/proc`
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcTelemetryCollector;

impl ProcTelemetryCollector {
    /// Creates a new collector
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

async fn run<T>(
    session: &dyn RemoteSession,
    query: &'static str,
    parse: impl FnOnce(&str) -> parser::ParseResult<T> + Send,
) -> Result<T, CollectionError> {
    let output = session
        .exec(query)
        .await
        .map_err(|e| CollectionError::Query {
            query: query.to_string(),
            reason: e.to_string(),
        })?;
    parse(&output).map_err(|reason| CollectionError::Parse {
        query: query.to_string(),
        reason,
    })
}

#[async_trait]
impl TelemetryCollector for ProcTelemetryCollector {
    async fn collect(&self, session: &dyn RemoteSession) -> Result<SystemInfo, CollectionError> {
        let os_name = run(session, queries::OS_RELEASE, TelemetryParser::os_name).await?;
        let kernel_version = run(session, queries::KERNEL, TelemetryParser::kernel_version).await?;
        let cpu_model = run(session, queries::CPU_INFO, TelemetryParser::cpu_model).await?;
        let cpu_cores = run(session, queries::CPU_CORES, TelemetryParser::cpu_cores).await?;
        let memory_usage = run(session, queries::MEMINFO, TelemetryParser::memory_usage).await?;
        let disk_usage = run(session, queries::DISK, TelemetryParser::disk_usage).await?;
        let load_average = run(session, queries::LOADAVG, TelemetryParser::load_average).await?;
        let uptime_secs = run(session, queries::UPTIME, TelemetryParser::uptime_secs).await?;

        Ok(SystemInfo {
            os_name,
            kernel_version,
            cpu_model,
            cpu_cores,
            memory_usage,
            disk_usage,
            load_average,
            uptime_secs,
        })
    }
}
