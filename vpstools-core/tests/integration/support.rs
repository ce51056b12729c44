//! Network-free doubles for the prober, session and telemetry seams

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use vpstools_core::telemetry::queries;
use vpstools_core::{
    ConnectionProber, ConnectionTestResult, FleetCoordinator, ProcTelemetryCollector,
    RemoteSession, SessionError, SessionOpener, VpsDraft, VpsInstance,
};

/// Prober whose answer depends on the instance host
#[derive(Default)]
pub struct ScriptedProber {
    unreachable: HashSet<String>,
    auth_failures: HashSet<String>,
    delay: Duration,
    calls: Mutex<HashMap<String, usize>>,
    total: AtomicUsize,
}

impl ScriptedProber {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn unreachable_host(mut self, host: &str) -> Self {
        self.unreachable.insert(host.to_string());
        self
    }

    pub fn rejecting_host(mut self, host: &str) -> Self {
        self.auth_failures.insert(host.to_string());
        self
    }

    pub fn calls_for(&self, host: &str) -> usize {
        self.calls.lock().unwrap().get(host).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionProber for ScriptedProber {
    async fn probe(&self, instance: &VpsInstance) -> ConnectionTestResult {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self
            .calls
            .lock()
            .unwrap()
            .entry(instance.host.clone())
            .or_default() += 1;

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.unreachable.contains(&instance.host) {
            ConnectionTestResult::unreachable("connection refused")
        } else if self.auth_failures.contains(&instance.host) {
            ConnectionTestResult::ssh_failed("Authentication failed: permission denied")
        } else {
            ConnectionTestResult::success()
        }
    }
}

/// Session answering the telemetry battery with a healthy Debian host
pub struct HealthySession;

#[async_trait]
impl RemoteSession for HealthySession {
    async fn exec(&self, command: &str) -> Result<String, SessionError> {
        let output = match command {
            queries::OS_RELEASE => "NAME=\"Debian GNU/Linux\"\nPRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\"\n",
            queries::KERNEL => "6.1.0-25-amd64\n",
            queries::CPU_INFO => "processor\t: 0\nmodel name\t: AMD EPYC 7543P 32-Core Processor\n",
            queries::CPU_CORES => "4\n",
            queries::MEMINFO => "MemTotal:        4000000 kB\nMemFree:          500000 kB\nMemAvailable:    1000000 kB\n",
            queries::DISK => "Filesystem     1024-blocks     Used Available Capacity Mounted on\n/dev/vda1         80000000 20000000  60000000      25% /\n",
            queries::LOADAVG => "0.15 0.10 0.05 1/180 9001\n",
            queries::UPTIME => "3600.25 14000.00\n",
            other => return Err(SessionError::InvalidOutput(format!("unexpected command {other}"))),
        };
        Ok(output.to_string())
    }
}

/// Opener handing out [`HealthySession`]s, refusing listed hosts
#[derive(Default)]
pub struct FakeOpener {
    refused: HashSet<String>,
    opened: AtomicUsize,
}

impl FakeOpener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing_host(mut self, host: &str) -> Self {
        self.refused.insert(host.to_string());
        self
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionOpener for FakeOpener {
    async fn open(&self, instance: &VpsInstance) -> Result<Box<dyn RemoteSession>, SessionError> {
        if self.refused.contains(&instance.host) {
            return Err(SessionError::Unreachable(instance.host.clone()));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(HealthySession))
    }
}

/// Coordinator over the given doubles and the real telemetry collector
pub fn coordinator(prober: Arc<ScriptedProber>, opener: Arc<FakeOpener>) -> FleetCoordinator {
    FleetCoordinator::new(prober, opener, Arc::new(ProcTelemetryCollector::new()))
}

/// A valid, not yet admitted instance
pub fn instance(name: &str, host: &str) -> VpsInstance {
    VpsDraft::with_password(host, 22, "root", "hunter2")
        .named(name)
        .into_instance()
        .unwrap()
}
