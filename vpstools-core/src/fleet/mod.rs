//! Fleet coordination: roster, probes and telemetry.

mod coordinator;

pub use coordinator::{DEFAULT_PROBE_CONCURRENCY, FleetCoordinator};
