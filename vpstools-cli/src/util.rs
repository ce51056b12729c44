//! Shared utility functions used across command modules.

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::Runtime;
use uuid::Uuid;
use vpstools_core::{
    ClientConfiguration, ConfigManager, ConfigurationCompiler, FileExportSink,
    FleetCoordinator, FleetDocument, FleetStore, VpsInstance,
};

use crate::error::CliError;

/// Creates a `ConfigManager` using the optional custom config directory
/// from CLI args.
pub fn create_config_manager(config_path: Option<&Path>) -> Result<ConfigManager, CliError> {
    match config_path {
        Some(path) => Ok(ConfigManager::with_config_dir(path.to_path_buf())),
        None => ConfigManager::new()
            .map_err(|e| CliError::Config(format!("Failed to initialize config: {e}"))),
    }
}

/// Fleet and catalog loaded from the fleet document, with the runtime
/// that drives the coordinator
pub struct Workspace {
    runtime: Runtime,
    store: FleetStore,
    /// Coordinator seeded with the stored roster
    pub fleet: FleetCoordinator,
    /// Compiler seeded with the stored catalog
    pub compiler: ConfigurationCompiler,
}

impl Workspace {
    /// Loads settings and the fleet document
    pub fn open(config_path: Option<&Path>) -> Result<Self, CliError> {
        let manager = create_config_manager(config_path)?;
        let settings = manager
            .load_settings()
            .map_err(|e| CliError::Config(format!("Failed to load settings: {e}")))?;
        let store = manager.fleet_store();
        let document = store
            .load()
            .map_err(|e| CliError::Config(format!("Failed to load fleet: {e}")))?;

        let runtime = Runtime::new()
            .map_err(|e| CliError::Config(format!("Failed to create async runtime: {e}")))?;

        tracing::debug!(
            path = %store.path().display(),
            instances = document.instances.len(),
            configurations = document.configurations.len(),
            "Loaded fleet document"
        );

        let fleet = FleetCoordinator::from_settings(&settings);
        runtime.block_on(fleet.restore(document.instances));

        let sink = Arc::new(FileExportSink::new(manager.export_dir(&settings)));
        let mut compiler = ConfigurationCompiler::new(sink);
        compiler.restore(document.configurations);

        Ok(Self {
            runtime,
            store,
            fleet,
            compiler,
        })
    }

    /// Runs a future on the workspace runtime
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Current roster, grouped
    pub fn instances(&self) -> Vec<VpsInstance> {
        self.block_on(self.fleet.list_instances())
    }

    /// Writes the roster and catalog back to the fleet document
    pub fn save(&self) -> Result<(), CliError> {
        let document = FleetDocument::new(
            self.block_on(self.fleet.snapshot()),
            self.compiler.snapshot(),
        );
        self.store
            .save(&document)
            .map_err(|e| CliError::Config(format!("Failed to save fleet: {e}")))
    }
}

/// Find an instance by name or UUID
pub fn find_instance<'a>(
    instances: &'a [VpsInstance],
    name_or_id: &str,
) -> Result<&'a VpsInstance, CliError> {
    // First try to find by exact name match
    if let Some(instance) = instances.iter().find(|i| i.name == name_or_id) {
        return Ok(instance);
    }

    // Try to find by UUID
    if let Ok(uuid) = Uuid::parse_str(name_or_id) {
        if let Some(instance) = instances.iter().find(|i| i.id == uuid) {
            return Ok(instance);
        }
    }

    // Try case-insensitive name match
    if let Some(instance) = instances
        .iter()
        .find(|i| i.name.eq_ignore_ascii_case(name_or_id))
    {
        return Ok(instance);
    }

    // Try partial name match (prefix)
    let needle = name_or_id.to_lowercase();
    let matches: Vec<_> = instances
        .iter()
        .filter(|i| i.name.to_lowercase().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] => Err(CliError::InstanceNotFound(name_or_id.to_string())),
        [single] => Ok(*single),
        _ => {
            let names: Vec<_> = matches.iter().map(|i| i.name.as_str()).collect();
            Err(CliError::Validation(format!(
                "Ambiguous instance name '{}'. Matches: {}",
                name_or_id,
                names.join(", ")
            )))
        }
    }
}

/// Find a client configuration by UUID, tag or unique UUID prefix
pub fn find_configuration<'a>(
    configurations: &[&'a ClientConfiguration],
    target: &str,
) -> Result<&'a ClientConfiguration, CliError> {
    if let Ok(uuid) = Uuid::parse_str(target) {
        if let Some(config) = configurations.iter().copied().find(|c| c.id == uuid) {
            return Ok(config);
        }
    }

    let by_tag: Vec<_> = configurations
        .iter()
        .copied()
        .filter(|c| c.tag() == target)
        .collect();
    if let [single] = by_tag.as_slice() {
        return Ok(*single);
    }

    let needle = target.to_lowercase();
    let matches: Vec<_> = configurations
        .iter()
        .copied()
        .filter(|c| c.id.to_string().starts_with(&needle))
        .collect();

    match matches.as_slice() {
        [] if by_tag.is_empty() => Err(CliError::ConfigurationNotFound(target.to_string())),
        [single] => Ok(*single),
        _ => Err(CliError::Validation(format!(
            "Ambiguous configuration '{target}'; use the full UUID"
        ))),
    }
}
