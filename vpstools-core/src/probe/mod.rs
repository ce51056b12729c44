//! Connection prober: reachability followed by an authenticated session.
//!
//! A probe never fails across its boundary. Every outcome, including a
//! host that cannot be resolved, is encoded in a [`ConnectionTestResult`].

mod reachability;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::VpsInstance;
use crate::session::{SessionOpener, SshCommandOpener};

pub use reachability::{ReachabilityError, check_reachable};

/// Default reachability timeout (seconds)
pub const DEFAULT_REACHABILITY_TIMEOUT_SECS: u64 = 5;

/// Outcome of one probe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionTestResult {
    /// Whether the SSH port accepted a TCP connection
    pub ping_success: bool,
    /// Whether an authenticated session was opened and verified
    pub ssh_success: bool,
    /// Failure text for the session step, or why it was not attempted
    pub ssh_error: Option<String>,
    /// When the probe finished
    pub timestamp: DateTime<Utc>,
}

impl ConnectionTestResult {
    /// Both steps succeeded
    #[must_use]
    pub fn success() -> Self {
        Self {
            ping_success: true,
            ssh_success: true,
            ssh_error: None,
            timestamp: Utc::now(),
        }
    }

    /// Reachable, but the session step failed
    #[must_use]
    pub fn ssh_failed(error: impl Into<String>) -> Self {
        Self {
            ping_success: true,
            ssh_success: false,
            ssh_error: Some(error.into()),
            timestamp: Utc::now(),
        }
    }

    /// Unreachable; the session step was not attempted
    #[must_use]
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            ping_success: false,
            ssh_success: false,
            ssh_error: Some(format!("not attempted: {}", reason.into())),
            timestamp: Utc::now(),
        }
    }

    /// Returns true if both steps succeeded
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.ping_success && self.ssh_success
    }

    /// Human-readable failure reason, if any
    #[must_use]
    pub fn failure_reason(&self) -> Option<&str> {
        if self.is_success() {
            None
        } else {
            Some(self.ssh_error.as_deref().unwrap_or("probe failed"))
        }
    }
}

/// Runs probes against instances
#[async_trait]
pub trait ConnectionProber: Send + Sync {
    /// Probes one instance; all failure is encoded in the result
    async fn probe(&self, instance: &VpsInstance) -> ConnectionTestResult;
}

/// Default prober: TCP connect, then an authenticated session
pub struct TcpSshProber {
    opener: Arc<dyn SessionOpener>,
    reachability_timeout: Duration,
}

impl TcpSshProber {
    /// Creates a prober over the given session opener
    #[must_use]
    pub fn new(opener: Arc<dyn SessionOpener>) -> Self {
        Self {
            opener,
            reachability_timeout: Duration::from_secs(DEFAULT_REACHABILITY_TIMEOUT_SECS),
        }
    }

    /// Sets the reachability timeout
    #[must_use]
    pub const fn with_reachability_timeout(mut self, timeout: Duration) -> Self {
        self.reachability_timeout = timeout;
        self
    }

    /// Gets the current reachability timeout
    #[must_use]
    pub const fn reachability_timeout(&self) -> Duration {
        self.reachability_timeout
    }
}

impl Default for TcpSshProber {
    fn default() -> Self {
        Self::new(Arc::new(SshCommandOpener::default()))
    }
}

#[async_trait]
impl ConnectionProber for TcpSshProber {
    async fn probe(&self, instance: &VpsInstance) -> ConnectionTestResult {
        let start = Instant::now();

        if let Err(e) =
            check_reachable(&instance.host, instance.port, self.reachability_timeout).await
        {
            tracing::debug!(
                vps_id = %instance.id,
                host = %instance.host,
                port = instance.port,
                error = %e,
                "Reachability check failed"
            );
            return ConnectionTestResult::unreachable(e.to_string());
        }

        let result = match self.opener.open(instance).await {
            Ok(_session) => ConnectionTestResult::success(),
            Err(e) => ConnectionTestResult::ssh_failed(e.to_string()),
        };

        tracing::debug!(
            vps_id = %instance.id,
            success = result.ssh_success,
            duration_ms = start.elapsed().as_millis() as u64,
            "Session check finished"
        );
        result
    }
}

/// One entry of a [`ProbeSummary`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeOutcome {
    /// Instance that was probed
    pub vps_id: Uuid,
    /// Instance name at probe time
    pub name: String,
    /// Probe result
    pub result: ConnectionTestResult,
}

/// Summary of a fleet-wide probe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProbeSummary {
    /// Number of instances probed
    pub total: usize,
    /// Number of probes where both steps succeeded
    pub passed: usize,
    /// Number of failed probes
    pub failed: usize,
    /// Individual outcomes
    pub results: Vec<ProbeOutcome>,
}

impl ProbeSummary {
    /// Creates a summary from a list of outcomes
    #[must_use]
    pub fn from_outcomes(results: Vec<ProbeOutcome>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|o| o.result.is_success()).count();

        Self {
            total,
            passed,
            failed: total - passed,
            results,
        }
    }

    /// Returns true if every probe succeeded
    #[must_use]
    pub const fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Returns the pass rate as a percentage (0.0 to 100.0)
    #[must_use]
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        (self.passed as f64 / self.total as f64) * 100.0
    }

    /// Returns a summary string
    #[must_use]
    pub fn summary_string(&self) -> String {
        format!(
            "Total: {}, Passed: {}, Failed: {} ({:.1}% pass rate)",
            self.total,
            self.passed,
            self.failed,
            self.pass_rate()
        )
    }

    /// Returns only the failed outcomes
    #[must_use]
    pub fn failed_results(&self) -> Vec<&ProbeOutcome> {
        self.results.iter().filter(|o| !o.result.is_success()).collect()
    }
}
