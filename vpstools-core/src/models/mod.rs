//! Core data model
//!
//! - [`VpsInstance`] and its drafts/patches, credentials and services
//! - [`ClientConfiguration`], the flattened persistence view of a proxy endpoint
//! - [`ClientConfigFormat`] / [`ClientAppType`], the render targets
//! - [`labels`], display names kept apart from the enums

mod client_config;
mod format;
pub mod labels;
mod vps;

pub use client_config::{
    Bandwidth, ClientConfiguration, ProtocolType, TlsConfig, TransportConfig, TransportType,
};
pub use format::{ClientAppType, ClientConfigFormat};
pub use vps::{
    AuthMethod, Credential, DEFAULT_GROUP, DEFAULT_SSH_PORT, ServiceStatus, ServiceType,
    SystemInfo, VpsDraft, VpsInstance, VpsPatch, VpsService,
};
