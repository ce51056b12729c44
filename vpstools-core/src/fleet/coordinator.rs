//! Fleet coordinator
//!
//! Owns the roster, the per-instance probe results and the in-flight set.
//! Probes run on spawned tasks; callers wait on a `watch` receiver stored
//! in the in-flight map, so a second request for the same instance
//! observes the pending probe instead of starting another one.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Instant;

use chrono::Utc;
use futures::FutureExt;
use futures::stream::{self, StreamExt};
use tokio::sync::{RwLock, watch};
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppSettings;
use crate::error::{FleetError, FleetResult};
use crate::models::{SystemInfo, VpsDraft, VpsInstance, VpsPatch, VpsService};
use crate::probe::{ConnectionProber, ConnectionTestResult, ProbeOutcome, ProbeSummary, TcpSshProber};
use crate::session::{SessionOpener, SshCommandOpener};
use crate::telemetry::{ProcTelemetryCollector, TelemetryCollector};
use crate::trace_operation;
use crate::tracing::span_names;

/// Default cap on probes `test_all_connections` runs at once; `0` probes
/// the whole roster at once
pub const DEFAULT_PROBE_CONCURRENCY: usize = 0;

type PendingProbe = watch::Receiver<Option<ConnectionTestResult>>;

/// Marker for a probe that has been started and not yet stored
struct InFlight {
    token: u64,
    pending: PendingProbe,
}

#[derive(Default)]
struct FleetState {
    roster: HashMap<Uuid, VpsInstance>,
    test_results: HashMap<Uuid, ConnectionTestResult>,
    in_flight: HashMap<Uuid, InFlight>,
    /// Bumped by `restore`; probes started under an older generation
    /// do not store their results
    generation: u64,
}

struct Inner {
    state: RwLock<FleetState>,
    prober: Arc<dyn ConnectionProber>,
    opener: Arc<dyn SessionOpener>,
    collector: Arc<dyn TelemetryCollector>,
    max_concurrency: usize,
    next_token: AtomicU64,
    ever_probed: AtomicBool,
    sweep_started: AtomicBool,
}

/// Coordinates the VPS roster and its probes.
///
/// Cloning is cheap and every clone shares the same state. All mutations
/// of roster entries go through the methods below; each read-modify-write
/// happens under one short lock that is never held across I/O.
#[derive(Clone)]
pub struct FleetCoordinator {
    inner: Arc<Inner>,
}

impl FleetCoordinator {
    /// Creates a coordinator with injected collaborators
    #[must_use]
    pub fn new(
        prober: Arc<dyn ConnectionProber>,
        opener: Arc<dyn SessionOpener>,
        collector: Arc<dyn TelemetryCollector>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: RwLock::new(FleetState::default()),
                prober,
                opener,
                collector,
                max_concurrency: DEFAULT_PROBE_CONCURRENCY,
                next_token: AtomicU64::new(1),
                ever_probed: AtomicBool::new(false),
                sweep_started: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a coordinator over the system `ssh` client
    #[must_use]
    pub fn from_settings(settings: &AppSettings) -> Self {
        let opener: Arc<dyn SessionOpener> =
            Arc::new(SshCommandOpener::new(settings.ssh_options()));
        let prober = TcpSshProber::new(Arc::clone(&opener))
            .with_reachability_timeout(settings.reachability_timeout());

        Self::new(Arc::new(prober), opener, Arc::new(ProcTelemetryCollector::new()))
            .with_max_concurrency(settings.probe.max_concurrency)
    }

    /// Caps how many probes `test_all_connections` runs at once; `0`
    /// lifts the cap.
    ///
    /// Must be called before the coordinator is cloned.
    #[must_use]
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.max_concurrency = max_concurrency;
        }
        self
    }

    /// Validates a draft, probes it once and admits it only on success.
    ///
    /// # Errors
    ///
    /// - [`FleetError::InvalidConfiguration`] if the draft is malformed; no I/O happens
    /// - [`FleetError::ConnectionFailed`] if the admission probe fails; the roster is unchanged
    pub async fn add_instance(&self, draft: VpsDraft) -> FleetResult<VpsInstance> {
        let mut instance = draft
            .into_instance()
            .map_err(FleetError::InvalidConfiguration)?;
        let span = trace_operation!(
            span_names::FLEET_ADD,
            vps_id = %instance.id,
            host = %instance.host,
            port = instance.port
        );

        async {
            let start = Instant::now();
            let result = self.inner.prober.probe(&instance).await;
            self.inner.ever_probed.store(true, Ordering::SeqCst);

            if !result.is_success() {
                let reason = result.failure_reason().unwrap_or("probe failed").to_string();
                tracing::warn!(
                    duration_ms = start.elapsed().as_millis() as u64,
                    error = %reason,
                    "Admission probe failed"
                );
                return Err(FleetError::ConnectionFailed(reason));
            }

            instance.last_connected = Some(result.timestamp);
            let mut state = self.inner.state.write().await;
            state.test_results.insert(instance.id, result);
            state.roster.insert(instance.id, instance.clone());
            drop(state);

            tracing::info!(
                duration_ms = start.elapsed().as_millis() as u64,
                "Instance admitted"
            );
            Ok(instance)
        }
        .instrument(span)
        .await
    }

    /// Removes an instance and all of its transient state.
    ///
    /// Returns `true` if the instance existed. Client configurations that
    /// reference it are left alone.
    pub async fn delete_instance(&self, id: Uuid) -> bool {
        let mut state = self.inner.state.write().await;
        state.test_results.remove(&id);
        state.in_flight.remove(&id);
        let removed = state.roster.remove(&id).is_some();
        drop(state);

        if removed {
            tracing::info!(vps_id = %id, "Instance deleted");
        }
        removed
    }

    /// Applies a patch and bumps `updated_at`; does not re-probe.
    ///
    /// # Errors
    ///
    /// - [`FleetError::NotFound`] if the instance does not exist
    /// - [`FleetError::InvalidConfiguration`] if the patched instance is invalid
    pub async fn edit_instance(&self, id: Uuid, patch: &VpsPatch) -> FleetResult<VpsInstance> {
        let mut state = self.inner.state.write().await;
        let current = state.roster.get(&id).ok_or(FleetError::NotFound(id))?;
        let patched = patch
            .apply_to(current)
            .map_err(FleetError::InvalidConfiguration)?;
        state.roster.insert(id, patched.clone());
        Ok(patched)
    }

    /// Appends a service reported by the deployment collaborator.
    ///
    /// # Errors
    ///
    /// - [`FleetError::NotFound`] if the instance does not exist
    /// - [`FleetError::DuplicateService`] if the service ID is already present
    pub async fn add_service(&self, vps_id: Uuid, service: VpsService) -> FleetResult<()> {
        let mut state = self.inner.state.write().await;
        let instance = state
            .roster
            .get_mut(&vps_id)
            .ok_or(FleetError::NotFound(vps_id))?;

        if instance.services.iter().any(|s| s.id == service.id) {
            return Err(FleetError::DuplicateService {
                vps_id,
                service_id: service.id,
            });
        }
        instance.services.push(service);
        instance.touch();
        Ok(())
    }

    /// Probes one instance, or waits for the probe already in flight.
    ///
    /// The result is stored even when the probe fails. A probe that
    /// finishes after the instance was deleted is returned but not stored.
    ///
    /// # Errors
    ///
    /// - [`FleetError::NotFound`] if the instance does not exist
    /// - [`FleetError::ConnectionFailed`] if the probe task died without a result
    pub async fn test_connection(&self, id: Uuid) -> FleetResult<ConnectionTestResult> {
        let mut pending = {
            let mut state = self.inner.state.write().await;
            if let Some(in_flight) = state.in_flight.get(&id) {
                tracing::debug!(vps_id = %id, "Probe already in flight, waiting for it");
                in_flight.pending.clone()
            } else {
                let instance = state.roster.get(&id).cloned().ok_or(FleetError::NotFound(id))?;
                let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
                let generation = state.generation;
                let (tx, rx) = watch::channel(None);
                state.in_flight.insert(
                    id,
                    InFlight {
                        token,
                        pending: rx.clone(),
                    },
                );
                self.inner.ever_probed.store(true, Ordering::SeqCst);

                let this = self.clone();
                let span = trace_operation!(span_names::FLEET_PROBE, vps_id = %id);
                tokio::spawn(
                    async move { this.run_probe(instance, token, generation, tx).await }
                        .instrument(span),
                );
                rx
            }
        };

        let result = pending
            .wait_for(Option::is_some)
            .await
            .ok()
            .and_then(|r| (*r).clone())
            .ok_or_else(|| {
                FleetError::ConnectionFailed("probe task ended without a result".to_string())
            })?;
        Ok(result)
    }

    async fn run_probe(
        &self,
        instance: VpsInstance,
        token: u64,
        generation: u64,
        tx: watch::Sender<Option<ConnectionTestResult>>,
    ) {
        let id = instance.id;
        let start = Instant::now();
        let result = AssertUnwindSafe(self.inner.prober.probe(&instance))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| ConnectionTestResult::ssh_failed("probe panicked"));

        {
            let mut guard = self.inner.state.write().await;
            let state = &mut *guard;
            if state.in_flight.get(&id).is_some_and(|f| f.token == token) {
                state.in_flight.remove(&id);
            }
            if state.generation != generation {
                tracing::debug!("Roster restored during probe, discarding result");
            } else if let Some(entry) = state.roster.get_mut(&id) {
                if result.ssh_success {
                    entry.last_connected = Some(result.timestamp);
                }
                state.test_results.insert(id, result.clone());
            } else {
                tracing::debug!("Instance deleted during probe, discarding result");
            }
        }

        tracing::info!(
            success = result.is_success(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Probe finished"
        );
        let _ = tx.send(Some(result));
    }

    /// Probes every instance concurrently and waits for all to settle.
    ///
    /// Instances deleted while the sweep runs are left out of the summary.
    pub async fn test_all_connections(&self) -> ProbeSummary {
        let targets: Vec<(Uuid, String)> = {
            let state = self.inner.state.read().await;
            state
                .roster
                .values()
                .map(|i| (i.id, i.name.clone()))
                .collect()
        };
        let span = trace_operation!(span_names::FLEET_PROBE_ALL, count = targets.len());
        let limit = match self.inner.max_concurrency {
            0 => targets.len().max(1),
            cap => cap,
        };

        async {
            let start = Instant::now();
            let mut outcomes: Vec<ProbeOutcome> = stream::iter(targets)
                .map(|(vps_id, name)| async move {
                    self.test_connection(vps_id)
                        .await
                        .ok()
                        .map(|result| ProbeOutcome {
                            vps_id,
                            name,
                            result,
                        })
                })
                .buffer_unordered(limit)
                .filter_map(std::future::ready)
                .collect()
                .await;
            outcomes.sort_by(|a, b| a.name.cmp(&b.name).then(a.vps_id.cmp(&b.vps_id)));

            let summary = ProbeSummary::from_outcomes(outcomes);
            tracing::info!(
                summary = %summary.summary_string(),
                duration_ms = start.elapsed().as_millis() as u64,
                "Fleet probe finished"
            );
            summary
        }
        .instrument(span)
        .await
    }

    /// Refreshes the telemetry snapshot of an instance.
    ///
    /// # Errors
    ///
    /// - [`FleetError::NotFound`] if the instance does not exist
    /// - [`FleetError::NotConnected`] without a prior successful session
    /// - [`FleetError::ConnectionFailed`] if the session cannot be reopened
    /// - [`FleetError::Collection`] if any telemetry query fails
    pub async fn get_system_info(&self, id: Uuid) -> FleetResult<SystemInfo> {
        let instance = {
            let state = self.inner.state.read().await;
            let instance = state.roster.get(&id).ok_or(FleetError::NotFound(id))?;
            if !state.test_results.get(&id).is_some_and(|r| r.ssh_success) {
                return Err(FleetError::NotConnected(id));
            }
            instance.clone()
        };
        let span = trace_operation!(span_names::FLEET_TELEMETRY, vps_id = %id);

        async {
            let session = self
                .inner
                .opener
                .open(&instance)
                .await
                .map_err(|e| FleetError::ConnectionFailed(e.to_string()))?;
            let info = self.inner.collector.collect(session.as_ref()).await.map_err(|e| {
                tracing::warn!(error = %e, "Telemetry collection failed");
                FleetError::from(e)
            })?;

            let mut state = self.inner.state.write().await;
            let entry = state.roster.get_mut(&id).ok_or(FleetError::NotFound(id))?;
            entry.system_info = Some(info.clone());
            entry.last_connected = Some(Utc::now());
            entry.touch();
            drop(state);

            tracing::debug!("Telemetry snapshot stored");
            Ok::<_, FleetError>(info)
        }
        .instrument(span)
        .await
    }

    /// True iff the roster is non-empty and nothing has been probed yet
    pub async fn needs_initial_probe_sweep(&self) -> bool {
        if self.inner.ever_probed.load(Ordering::SeqCst) {
            return false;
        }
        !self.inner.state.read().await.roster.is_empty()
    }

    /// Runs the startup sweep at most once per coordinator.
    ///
    /// Returns `None` when no sweep is needed or one has already started.
    pub async fn run_initial_probe_sweep(&self) -> Option<ProbeSummary> {
        if !self.needs_initial_probe_sweep().await {
            return None;
        }
        if self.inner.sweep_started.swap(true, Ordering::SeqCst) {
            return None;
        }
        Some(self.test_all_connections().await)
    }

    /// Instances sorted by group, then name
    pub async fn list_instances(&self) -> Vec<VpsInstance> {
        let state = self.inner.state.read().await;
        let mut instances: Vec<VpsInstance> = state.roster.values().cloned().collect();
        drop(state);
        instances.sort_by(|a, b| {
            a.group
                .cmp(&b.group)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });
        instances
    }

    /// Returns a copy of one instance
    pub async fn get_instance(&self, id: Uuid) -> Option<VpsInstance> {
        self.inner.state.read().await.roster.get(&id).cloned()
    }

    /// Returns the last stored probe result of an instance
    pub async fn test_result(&self, id: Uuid) -> Option<ConnectionTestResult> {
        self.inner.state.read().await.test_results.get(&id).cloned()
    }

    /// Whether a probe for the instance is currently running
    pub async fn is_in_flight(&self, id: Uuid) -> bool {
        self.inner.state.read().await.in_flight.contains_key(&id)
    }

    /// Number of instances in the roster
    pub async fn len(&self) -> usize {
        self.inner.state.read().await.roster.len()
    }

    /// Whether the roster is empty
    pub async fn is_empty(&self) -> bool {
        self.inner.state.read().await.roster.is_empty()
    }

    /// Copy of the roster for persistence, in [`Self::list_instances`] order
    pub async fn snapshot(&self) -> Vec<VpsInstance> {
        self.list_instances().await
    }

    /// Replaces the roster wholesale and clears stored probe results.
    ///
    /// A probe still running for an instance that survives the restore
    /// stays in flight, so callers keep joining it instead of starting a
    /// second one; its result is not stored.
    pub async fn restore(&self, instances: Vec<VpsInstance>) {
        let mut guard = self.inner.state.write().await;
        let state = &mut *guard;
        state.roster = instances.into_iter().map(|i| (i.id, i)).collect();
        state.test_results.clear();
        let roster = &state.roster;
        state.in_flight.retain(|id, _| roster.contains_key(id));
        state.generation += 1;
    }
}

impl std::fmt::Debug for FleetCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetCoordinator")
            .field("max_concurrency", &self.inner.max_concurrency)
            .finish_non_exhaustive()
    }
}
