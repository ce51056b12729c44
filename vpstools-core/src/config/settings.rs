//! Application settings stored in `settings.toml`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::session::SshOptions;
use crate::tracing::TracingLevel;

/// Root settings document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Connection probing
    pub probe: ProbeSettings,
    /// SSH client invocation
    pub ssh: SshSettings,
    /// Export destination
    pub export: ExportSettings,
    /// Logging
    pub logging: LoggingSettings,
}

impl AppSettings {
    /// SSH options derived from the `[ssh]` and `[probe]` sections
    #[must_use]
    pub fn ssh_options(&self) -> SshOptions {
        SshOptions {
            binary: self.ssh.binary.clone(),
            use_sshpass: self.ssh.use_sshpass,
            strict_host_key_checking: self.ssh.strict_host_key_checking,
            connect_timeout_secs: self.probe.reachability_timeout_secs.max(1),
            command_timeout: Duration::from_secs(self.probe.session_timeout_secs.max(1)),
        }
    }

    /// Timeout of the TCP reachability step
    #[must_use]
    pub const fn reachability_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.reachability_timeout_secs)
    }
}

/// `[probe]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSettings {
    /// TCP connect timeout in seconds
    pub reachability_timeout_secs: u64,
    /// Upper bound on a single remote command in seconds
    pub session_timeout_secs: u64,
    /// Probes run at once by `vps test all`; `0` means the whole fleet
    pub max_concurrency: usize,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            reachability_timeout_secs: 5,
            session_timeout_secs: 10,
            max_concurrency: crate::fleet::DEFAULT_PROBE_CONCURRENCY,
        }
    }
}

/// `[ssh]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshSettings {
    /// Reject unknown host keys
    pub strict_host_key_checking: bool,
    /// Feed passwords through `sshpass -e`
    pub use_sshpass: bool,
    /// `ssh` binary
    pub binary: String,
}

impl Default for SshSettings {
    fn default() -> Self {
        Self {
            strict_host_key_checking: false,
            use_sshpass: true,
            binary: "ssh".to_string(),
        }
    }
}

/// `[export]` section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSettings {
    /// Output directory; `<data_dir>/vpstools/exports` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
}

/// `[logging]` section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Base level name
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: TracingLevel::Info.as_str().to_string(),
        }
    }
}

impl LoggingSettings {
    /// Parsed level; unknown names fall back to `info`
    #[must_use]
    pub fn tracing_level(&self) -> TracingLevel {
        self.level.parse().unwrap_or_default()
    }
}
