//! Client configuration compiler.
//!
//! [`ConfigurationCompiler`] owns the catalog of [`ClientConfiguration`]
//! records and renders them into the documents and share links consumed by
//! client applications. Rendering is a pure function of the record and the
//! requested target: the same inputs always produce byte-identical output.

pub mod clash;
mod endpoint;
pub mod singbox;
pub mod uri;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::error::{CompileError, CompileResult, ExportError, ExportResult};
use crate::export::{ExportLocation, ExportSink, MemoryExportSink, export_filename};
use crate::models::{ClientAppType, ClientConfigFormat, ClientConfiguration};
use crate::trace_operation;
use crate::tracing::span_names;

pub use endpoint::{DEFAULT_VMESS_SECURITY, EndpointBase, ProtocolEndpoint};

/// Catalog of client configurations plus the renderers over it
pub struct ConfigurationCompiler {
    catalog: BTreeMap<Uuid, ClientConfiguration>,
    sink: Arc<dyn ExportSink>,
}

impl fmt::Debug for ConfigurationCompiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigurationCompiler")
            .field("configurations", &self.catalog.len())
            .finish_non_exhaustive()
    }
}

impl Default for ConfigurationCompiler {
    fn default() -> Self {
        Self::new(Arc::new(MemoryExportSink::new()))
    }
}

impl ConfigurationCompiler {
    /// Creates an empty compiler exporting through `sink`
    #[must_use]
    pub fn new(sink: Arc<dyn ExportSink>) -> Self {
        Self {
            catalog: BTreeMap::new(),
            sink,
        }
    }

    /// Adds a record to the catalog
    ///
    /// Records are stored as given; protocol fields are checked at render
    /// time so that incomplete records can still be inspected and fixed.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::DuplicateConfiguration`] if the ID is taken.
    pub fn register(&mut self, config: ClientConfiguration) -> CompileResult<Uuid> {
        if self.catalog.contains_key(&config.id) {
            return Err(CompileError::DuplicateConfiguration(config.id));
        }
        let id = config.id;
        tracing::debug!(config_id = %id, protocol = %config.protocol_type, "Configuration registered");
        self.catalog.insert(id, config);
        Ok(id)
    }

    /// Removes a record; returns it if it was present
    pub fn remove(&mut self, id: Uuid) -> Option<ClientConfiguration> {
        self.catalog.remove(&id)
    }

    /// Looks up a record
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&ClientConfiguration> {
        self.catalog.get(&id)
    }

    /// All records, ordered by ID
    #[must_use]
    pub fn list(&self) -> Vec<&ClientConfiguration> {
        self.catalog.values().collect()
    }

    /// Records deployed on one instance, ordered by ID
    #[must_use]
    pub fn list_for_vps(&self, vps_id: Uuid) -> Vec<&ClientConfiguration> {
        self.catalog
            .values()
            .filter(|c| c.vps_id == vps_id)
            .collect()
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.catalog.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.catalog.is_empty()
    }

    /// Copies the catalog for persistence
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientConfiguration> {
        self.catalog.values().cloned().collect()
    }

    /// Replaces the catalog wholesale
    pub fn restore(&mut self, configurations: Vec<ClientConfiguration>) {
        self.catalog = configurations.into_iter().map(|c| (c.id, c)).collect();
    }

    fn lookup(&self, id: Uuid) -> CompileResult<&ClientConfiguration> {
        self.catalog
            .get(&id)
            .ok_or(CompileError::UnknownConfiguration(id))
    }

    /// Renders one record into `format`, tailored to `app`
    ///
    /// When `app` is `None` the format's default application is used.
    ///
    /// # Errors
    ///
    /// Checked in this order: unknown ID, format/app mismatch, missing
    /// protocol fields, protocol not supported by the app.
    pub fn render(
        &self,
        id: Uuid,
        format: ClientConfigFormat,
        app: Option<ClientAppType>,
    ) -> CompileResult<String> {
        let config = self.lookup(id)?;
        render_records(&[config], format, app)
    }

    /// Renders every record of one instance into a single document
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::NoConfigurations`] when the instance has no
    /// records, otherwise the same errors as [`Self::render`].
    pub fn render_for_vps(
        &self,
        vps_id: Uuid,
        format: ClientConfigFormat,
        app: Option<ClientAppType>,
    ) -> CompileResult<String> {
        let configs = self.list_for_vps(vps_id);
        if configs.is_empty() {
            return Err(CompileError::NoConfigurations(vps_id));
        }
        render_records(&configs, format, app)
    }

    /// Renders one record as a share link
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::UnknownConfiguration`] or
    /// [`CompileError::MissingField`].
    pub fn generate_protocol_url(&self, id: Uuid) -> CompileResult<String> {
        let endpoint = ProtocolEndpoint::try_from(self.lookup(id)?)?;
        Ok(uri::generate(&endpoint))
    }

    /// Parses a share link into a record owned by `vps_id`
    ///
    /// The record is returned, not registered.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::MalformedUri`] or
    /// [`CompileError::UnsupportedProtocol`] for unknown schemes.
    pub fn parse_protocol_url(uri: &str, vps_id: Uuid) -> CompileResult<ClientConfiguration> {
        uri::parse(uri, vps_id)
    }

    /// Renders one record and hands the artifact to the export sink
    ///
    /// # Errors
    ///
    /// Rendering errors are returned as [`crate::error::ExportError::Render`]
    /// before the sink is touched; sink failures as
    /// [`crate::error::ExportError::Failed`].
    pub async fn export_config(
        &self,
        id: Uuid,
        format: ClientConfigFormat,
        app: Option<ClientAppType>,
    ) -> ExportResult<ExportLocation> {
        let span = trace_operation!(
            span_names::COMPILER_EXPORT,
            config_id = %id,
            format = %format
        );
        async {
            let content = self.render(id, format, app)?;
            let config = self.lookup(id)?;
            let filename = export_filename(config, format);
            let location = self.sink.write(&filename, &content).await.inspect_err(|e| {
                tracing::warn!(error = %e, "Export failed");
            })?;
            tracing::info!(location = %location, "Configuration exported");
            Ok::<_, ExportError>(location)
        }
        .instrument(span)
        .await
    }
}

fn render_records(
    configs: &[&ClientConfiguration],
    format: ClientConfigFormat,
    app: Option<ClientAppType>,
) -> CompileResult<String> {
    let app = app.unwrap_or_else(|| format.default_app());
    let _span = trace_operation!(
        span_names::COMPILER_RENDER,
        format = %format,
        app = %app,
        count = configs.len()
    )
    .entered();

    if app.format() != format {
        return Err(CompileError::UnsupportedCombination { format, app });
    }

    let endpoints = configs
        .iter()
        .map(|c| ProtocolEndpoint::try_from(*c))
        .collect::<CompileResult<Vec<_>>>()?;

    if let Some(unsupported) = endpoints.iter().find(|e| !app.supports(e.protocol())) {
        return Err(CompileError::UnsupportedProtocol {
            protocol: unsupported.protocol().to_string(),
            target: app.to_string(),
        });
    }

    match format {
        ClientConfigFormat::SingBox => singbox::render(&endpoints, app),
        ClientConfigFormat::Clash => clash::render(&endpoints, app),
        ClientConfigFormat::UriBundle => {
            let links: Vec<String> = endpoints.iter().map(uri::generate).collect();
            Ok(uri::bundle(&links, app))
        }
    }
}
