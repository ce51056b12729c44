//! Client configuration records produced by the deployment collaborator.
//!
//! [`ClientConfiguration`] is the flattened view used for persistence and
//! at the API boundary. The compiler converts it into a per-protocol
//! [`crate::compiler::ProtocolEndpoint`] before rendering.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Proxy protocol of a client configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolType {
    /// Shadowsocks
    Shadowsocks,
    /// VMess
    Vmess,
    /// VLESS
    Vless,
    /// Trojan
    Trojan,
    /// Hysteria (v1)
    Hysteria,
    /// Hysteria2
    Hysteria2,
    /// TUIC (v5)
    Tuic,
}

impl ProtocolType {
    /// Returns all protocols in declaration order
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Shadowsocks,
            Self::Vmess,
            Self::Vless,
            Self::Trojan,
            Self::Hysteria,
            Self::Hysteria2,
            Self::Tuic,
        ]
    }

    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Shadowsocks => "shadowsocks",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Hysteria => "hysteria",
            Self::Hysteria2 => "hysteria2",
            Self::Tuic => "tuic",
        }
    }
}

impl fmt::Display for ProtocolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProtocolType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "shadowsocks" | "ss" => Ok(Self::Shadowsocks),
            "vmess" => Ok(Self::Vmess),
            "vless" => Ok(Self::Vless),
            "trojan" => Ok(Self::Trojan),
            "hysteria" => Ok(Self::Hysteria),
            "hysteria2" | "hy2" => Ok(Self::Hysteria2),
            "tuic" => Ok(Self::Tuic),
            other => Err(format!("unknown protocol '{other}'")),
        }
    }
}

/// Stream transport carrying the proxy protocol
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// Plain TCP (no transport block)
    #[default]
    Tcp,
    /// WebSocket
    Ws,
    /// gRPC
    Grpc,
    /// HTTP/2
    Http,
    /// HTTP upgrade
    HttpUpgrade,
}

impl TransportType {
    /// Stable machine identifier, also the share-link `type` value
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Ws => "ws",
            Self::Grpc => "grpc",
            Self::Http => "http",
            Self::HttpUpgrade => "httpupgrade",
        }
    }
}

impl std::str::FromStr for TransportType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tcp" | "" => Ok(Self::Tcp),
            "ws" | "websocket" => Ok(Self::Ws),
            "grpc" => Ok(Self::Grpc),
            "http" | "h2" => Ok(Self::Http),
            "httpupgrade" => Ok(Self::HttpUpgrade),
            other => Err(format!("unknown transport '{other}'")),
        }
    }
}

/// Transport parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Transport kind
    #[serde(rename = "type")]
    pub transport_type: TransportType,
    /// Request path (service name for gRPC)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Host header / authority
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
}

/// TLS parameters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Whether TLS is enabled
    pub enabled: bool,
    /// SNI server name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    /// Skip certificate verification
    #[serde(default)]
    pub allow_insecure: bool,
    /// ALPN protocols in preference order
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpn: Option<Vec<String>>,
}

impl TlsConfig {
    /// Enabled TLS with the given SNI
    #[must_use]
    pub fn enabled_with_sni(server_name: impl Into<String>) -> Self {
        Self {
            enabled: true,
            server_name: Some(server_name.into()),
            allow_insecure: false,
            alpn: None,
        }
    }
}

/// Bandwidth hints for Hysteria (v1)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bandwidth {
    /// Upload in Mbps
    pub up_mbps: u32,
    /// Download in Mbps
    pub down_mbps: u32,
}

/// A provisioned proxy endpoint as seen by client applications
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfiguration {
    /// Unique identifier, generated when absent from imported JSON
    #[serde(default = "Uuid::new_v4")]
    pub id: Uuid,
    /// Instance the endpoint was deployed on (relation only, no ownership)
    pub vps_id: Uuid,
    /// Protocol
    pub protocol_type: ProtocolType,
    /// Server address clients connect to
    pub server_address: String,
    /// Server port
    pub port: u16,
    /// Display tag used as outbound name and share-link fragment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    /// Password / auth string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// User UUID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
    /// Cipher or encryption method
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// VLESS flow control
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    /// Hysteria (v1) bandwidth
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bandwidth: Option<Bandwidth>,
    /// TUIC congestion control algorithm
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_control: Option<String>,
    /// Transport block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<TransportConfig>,
    /// TLS block
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<TlsConfig>,
}

impl ClientConfiguration {
    /// Creates a record with only the common fields populated
    #[must_use]
    pub fn new(
        vps_id: Uuid,
        protocol_type: ProtocolType,
        server_address: impl Into<String>,
        port: u16,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            vps_id,
            protocol_type,
            server_address: server_address.into(),
            port,
            remark: None,
            password: None,
            uuid: None,
            method: None,
            flow: None,
            bandwidth: None,
            congestion_control: None,
            transport: None,
            tls: None,
        }
    }

    /// Display tag: the remark, or `protocol-address:port`
    #[must_use]
    pub fn tag(&self) -> String {
        self.remark
            .clone()
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| {
                format!(
                    "{}-{}:{}",
                    self.protocol_type, self.server_address, self.port
                )
            })
    }

    /// Sets the remark
    #[must_use]
    pub fn with_remark(mut self, remark: impl Into<String>) -> Self {
        self.remark = Some(remark.into());
        self
    }

    /// Sets the password
    #[must_use]
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the user UUID
    #[must_use]
    pub fn with_uuid(mut self, uuid: impl Into<String>) -> Self {
        self.uuid = Some(uuid.into());
        self
    }

    /// Sets the cipher/encryption method
    #[must_use]
    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Sets the transport block
    #[must_use]
    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Sets the TLS block
    #[must_use]
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_roundtrip_ids() {
        for protocol in ProtocolType::all() {
            assert_eq!(protocol.as_str().parse::<ProtocolType>(), Ok(*protocol));
        }
        assert_eq!("hy2".parse::<ProtocolType>(), Ok(ProtocolType::Hysteria2));
        assert!("socks".parse::<ProtocolType>().is_err());
    }

    #[test]
    fn test_default_tag() {
        let config = ClientConfiguration::new(Uuid::nil(), ProtocolType::Trojan, "1.2.3.4", 443);
        assert_eq!(config.tag(), "trojan-1.2.3.4:443");
        assert_eq!(config.with_remark("edge").tag(), "edge");
    }

    #[test]
    fn test_optional_fields_skipped_in_json() {
        let config = ClientConfiguration::new(Uuid::nil(), ProtocolType::Vless, "h", 443)
            .with_uuid("b831381d-6324-4d53-ad4f-8cda48b30811");
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["protocol_type"], "vless");
        assert!(json.get("password").is_none());
        assert!(json.get("tls").is_none());
    }

    #[test]
    fn test_transport_type_serde() {
        let transport = TransportConfig {
            transport_type: TransportType::HttpUpgrade,
            path: Some("/up".to_string()),
            host: None,
        };
        let json = serde_json::to_string(&transport).unwrap();
        assert_eq!(json, r#"{"type":"httpupgrade","path":"/up"}"#);
    }
}
