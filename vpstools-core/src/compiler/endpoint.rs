//! Per-protocol endpoint variants.
//!
//! A [`ClientConfiguration`] carries every protocol field as an `Option`.
//! Converting it into a [`ProtocolEndpoint`] checks the fields the protocol
//! requires once; renderers then work with plain values and cannot observe
//! a missing field.

use std::collections::HashSet;

use crate::error::{CompileError, CompileResult};
use crate::models::{
    Bandwidth, ClientConfiguration, ProtocolType, TlsConfig, TransportConfig, TransportType,
};

/// VMess security used when the record leaves `method` empty
pub const DEFAULT_VMESS_SECURITY: &str = "auto";

/// Fields shared by every protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointBase {
    /// Outbound / proxy name
    pub tag: String,
    /// Server address
    pub server: String,
    /// Server port
    pub port: u16,
    /// Stream transport; `None` for plain TCP
    pub transport: Option<TransportConfig>,
}

/// A validated endpoint, one variant per protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolEndpoint {
    /// Shadowsocks
    Shadowsocks {
        /// Shared fields
        base: EndpointBase,
        /// Cipher
        method: String,
        /// Password
        password: String,
    },
    /// VMess
    Vmess {
        /// Shared fields
        base: EndpointBase,
        /// User UUID
        uuid: String,
        /// Security (cipher), `auto` by default
        security: String,
        /// Optional TLS
        tls: Option<TlsConfig>,
    },
    /// VLESS
    Vless {
        /// Shared fields
        base: EndpointBase,
        /// User UUID
        uuid: String,
        /// Flow control (e.g. `xtls-rprx-vision`)
        flow: Option<String>,
        /// Optional TLS
        tls: Option<TlsConfig>,
    },
    /// Trojan
    Trojan {
        /// Shared fields
        base: EndpointBase,
        /// Password
        password: String,
        /// TLS
        tls: TlsConfig,
    },
    /// Hysteria (v1)
    Hysteria {
        /// Shared fields
        base: EndpointBase,
        /// Auth string
        auth: String,
        /// Bandwidth hints
        bandwidth: Bandwidth,
        /// TLS
        tls: TlsConfig,
    },
    /// Hysteria2
    Hysteria2 {
        /// Shared fields
        base: EndpointBase,
        /// Password
        password: String,
        /// TLS
        tls: TlsConfig,
    },
    /// TUIC (v5)
    Tuic {
        /// Shared fields
        base: EndpointBase,
        /// User UUID
        uuid: String,
        /// Password
        password: String,
        /// Congestion control algorithm
        congestion_control: Option<String>,
        /// TLS
        tls: TlsConfig,
    },
}

impl ProtocolEndpoint {
    /// Protocol of this endpoint
    #[must_use]
    pub const fn protocol(&self) -> ProtocolType {
        match self {
            Self::Shadowsocks { .. } => ProtocolType::Shadowsocks,
            Self::Vmess { .. } => ProtocolType::Vmess,
            Self::Vless { .. } => ProtocolType::Vless,
            Self::Trojan { .. } => ProtocolType::Trojan,
            Self::Hysteria { .. } => ProtocolType::Hysteria,
            Self::Hysteria2 { .. } => ProtocolType::Hysteria2,
            Self::Tuic { .. } => ProtocolType::Tuic,
        }
    }

    /// Shared fields
    #[must_use]
    pub const fn base(&self) -> &EndpointBase {
        match self {
            Self::Shadowsocks { base, .. }
            | Self::Vmess { base, .. }
            | Self::Vless { base, .. }
            | Self::Trojan { base, .. }
            | Self::Hysteria { base, .. }
            | Self::Hysteria2 { base, .. }
            | Self::Tuic { base, .. } => base,
        }
    }

    /// Outbound / proxy name
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.base().tag
    }

    fn base_mut(&mut self) -> &mut EndpointBase {
        match self {
            Self::Shadowsocks { base, .. }
            | Self::Vmess { base, .. }
            | Self::Vless { base, .. }
            | Self::Trojan { base, .. }
            | Self::Hysteria { base, .. }
            | Self::Hysteria2 { base, .. }
            | Self::Tuic { base, .. } => base,
        }
    }

    /// Enabled TLS settings, if the endpoint uses TLS
    #[must_use]
    pub const fn tls(&self) -> Option<&TlsConfig> {
        match self {
            Self::Shadowsocks { .. } => None,
            Self::Vmess { tls, .. } | Self::Vless { tls, .. } => tls.as_ref(),
            Self::Trojan { tls, .. }
            | Self::Hysteria { tls, .. }
            | Self::Hysteria2 { tls, .. }
            | Self::Tuic { tls, .. } => Some(tls),
        }
    }
}

/// Copies `endpoints` with tags made unique within the document.
///
/// Names are compared case-insensitively. A tag equal to one of `reserved`
/// or to an earlier tag gets the first free `-2`, `-3`, ... suffix, so the
/// result depends only on the input order.
#[must_use]
pub fn with_unique_tags(endpoints: &[ProtocolEndpoint], reserved: &[&str]) -> Vec<ProtocolEndpoint> {
    let mut taken: HashSet<String> = reserved.iter().map(|r| r.to_lowercase()).collect();
    endpoints
        .iter()
        .map(|endpoint| {
            let mut endpoint = endpoint.clone();
            let tag = endpoint.tag().to_string();
            let mut candidate = tag.clone();
            let mut suffix = 2;
            while taken.contains(&candidate.to_lowercase()) {
                candidate = format!("{tag}-{suffix}");
                suffix += 1;
            }
            taken.insert(candidate.to_lowercase());
            endpoint.base_mut().tag = candidate;
            endpoint
        })
        .collect()
}

impl TryFrom<&ClientConfiguration> for ProtocolEndpoint {
    type Error = CompileError;

    fn try_from(config: &ClientConfiguration) -> CompileResult<Self> {
        let protocol = config.protocol_type;
        let require = |value: &Option<String>, field: &'static str| {
            value
                .as_deref()
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or(CompileError::MissingField { protocol, field })
        };
        let require_tls = || {
            config
                .tls
                .clone()
                .filter(|tls| tls.enabled)
                .ok_or(CompileError::MissingField {
                    protocol,
                    field: "tls",
                })
        };

        if config.server_address.trim().is_empty() {
            return Err(CompileError::MissingField {
                protocol,
                field: "server_address",
            });
        }
        if config.port == 0 {
            return Err(CompileError::MissingField {
                protocol,
                field: "port",
            });
        }

        let base = EndpointBase {
            tag: config.tag(),
            server: config.server_address.trim().to_string(),
            port: config.port,
            transport: config
                .transport
                .clone()
                .filter(|t| t.transport_type != TransportType::Tcp),
        };
        let optional_tls = config.tls.clone().filter(|tls| tls.enabled);

        let endpoint = match protocol {
            ProtocolType::Shadowsocks => Self::Shadowsocks {
                method: require(&config.method, "method")?,
                password: require(&config.password, "password")?,
                base,
            },
            ProtocolType::Vmess => Self::Vmess {
                uuid: require(&config.uuid, "uuid")?,
                security: config
                    .method
                    .clone()
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| DEFAULT_VMESS_SECURITY.to_string()),
                tls: optional_tls,
                base,
            },
            ProtocolType::Vless => Self::Vless {
                uuid: require(&config.uuid, "uuid")?,
                flow: config.flow.clone().filter(|f| !f.is_empty()),
                tls: optional_tls,
                base,
            },
            ProtocolType::Trojan => Self::Trojan {
                password: require(&config.password, "password")?,
                tls: require_tls()?,
                base,
            },
            ProtocolType::Hysteria => Self::Hysteria {
                auth: require(&config.password, "password")?,
                bandwidth: config.bandwidth.ok_or(CompileError::MissingField {
                    protocol,
                    field: "bandwidth",
                })?,
                tls: require_tls()?,
                base,
            },
            ProtocolType::Hysteria2 => Self::Hysteria2 {
                password: require(&config.password, "password")?,
                tls: require_tls()?,
                base,
            },
            ProtocolType::Tuic => Self::Tuic {
                uuid: require(&config.uuid, "uuid")?,
                password: require(&config.password, "password")?,
                congestion_control: config.congestion_control.clone().filter(|c| !c.is_empty()),
                tls: require_tls()?,
                base,
            },
        };
        Ok(endpoint)
    }
}
