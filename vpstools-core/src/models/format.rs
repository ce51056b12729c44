//! Render targets: output formats and the client applications consuming them.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::ProtocolType;

/// Output document format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ClientConfigFormat {
    /// sing-box JSON document
    #[serde(rename = "sing-box")]
    SingBox,
    /// Clash / mihomo YAML document
    #[serde(rename = "clash")]
    Clash,
    /// Newline-separated share links
    #[serde(rename = "uri")]
    UriBundle,
}

impl ClientConfigFormat {
    /// Returns all formats
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[Self::SingBox, Self::Clash, Self::UriBundle]
    }

    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingBox => "sing-box",
            Self::Clash => "clash",
            Self::UriBundle => "uri",
        }
    }

    /// File extension for exported artifacts
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::SingBox => "json",
            Self::Clash => "yaml",
            Self::UriBundle => "txt",
        }
    }

    /// Client app used when a render request names none
    #[must_use]
    pub const fn default_app(self) -> ClientAppType {
        match self {
            Self::SingBox => ClientAppType::SingBox,
            Self::Clash => ClientAppType::ClashVerge,
            Self::UriBundle => ClientAppType::V2rayNg,
        }
    }
}

impl fmt::Display for ClientConfigFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientConfigFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "sing-box" | "singbox" | "json" => Ok(Self::SingBox),
            "clash" | "mihomo" | "yaml" => Ok(Self::Clash),
            "uri" | "url" | "links" => Ok(Self::UriBundle),
            other => Err(format!("unknown format '{other}'")),
        }
    }
}

/// Client application a document is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClientAppType {
    /// sing-box desktop core
    SingBox,
    /// sing-box for Android
    Sfa,
    /// sing-box for Apple platforms
    Sfi,
    /// Clash Verge (mihomo core)
    ClashVerge,
    /// Clash for Windows (premium core)
    ClashForWindows,
    /// Stash
    Stash,
    /// v2rayN
    #[serde(rename = "v2rayn")]
    V2rayN,
    /// v2rayNG
    #[serde(rename = "v2rayng")]
    V2rayNg,
    /// Shadowrocket
    Shadowrocket,
    /// NekoBox
    NekoBox,
}

impl ClientAppType {
    /// Returns all apps
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::SingBox,
            Self::Sfa,
            Self::Sfi,
            Self::ClashVerge,
            Self::ClashForWindows,
            Self::Stash,
            Self::V2rayN,
            Self::V2rayNg,
            Self::Shadowrocket,
            Self::NekoBox,
        ]
    }

    /// Stable machine identifier
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SingBox => "sing-box",
            Self::Sfa => "sfa",
            Self::Sfi => "sfi",
            Self::ClashVerge => "clash-verge",
            Self::ClashForWindows => "clash-for-windows",
            Self::Stash => "stash",
            Self::V2rayN => "v2rayn",
            Self::V2rayNg => "v2rayng",
            Self::Shadowrocket => "shadowrocket",
            Self::NekoBox => "nekobox",
        }
    }

    /// The single format this app consumes
    #[must_use]
    pub const fn format(self) -> ClientConfigFormat {
        match self {
            Self::SingBox | Self::Sfa | Self::Sfi => ClientConfigFormat::SingBox,
            Self::ClashVerge | Self::ClashForWindows | Self::Stash => ClientConfigFormat::Clash,
            Self::V2rayN | Self::V2rayNg | Self::Shadowrocket | Self::NekoBox => {
                ClientConfigFormat::UriBundle
            }
        }
    }

    /// Whether the app's core understands the protocol
    #[must_use]
    pub const fn supports(self, protocol: ProtocolType) -> bool {
        match self {
            // Premium core predates VLESS, Hysteria and TUIC
            Self::ClashForWindows => matches!(
                protocol,
                ProtocolType::Shadowsocks | ProtocolType::Vmess | ProtocolType::Trojan
            ),
            _ => true,
        }
    }

    /// Whether the app runs as a mobile VPN and needs a TUN inbound
    #[must_use]
    pub const fn uses_tun(self) -> bool {
        matches!(self, Self::Sfa | Self::Sfi)
    }

    /// Whether the app expects URI bundles as a base64 subscription body
    #[must_use]
    pub const fn wants_base64_bundle(self) -> bool {
        matches!(self, Self::V2rayN | Self::Shadowrocket)
    }
}

impl fmt::Display for ClientAppType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ClientAppType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|app| app.as_str() == lower)
            .ok_or_else(|| format!("unknown client app '{s}'"))
    }
}
