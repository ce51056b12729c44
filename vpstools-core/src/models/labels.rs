//! Human-readable labels for the domain enums.
//!
//! Kept apart from the enums themselves, which only carry stable machine
//! identifiers used in logic and persistence.

use super::{ClientAppType, ClientConfigFormat, ProtocolType, ServiceStatus, ServiceType};

/// Display label of an output format
#[must_use]
pub const fn format_label(format: ClientConfigFormat) -> &'static str {
    match format {
        ClientConfigFormat::SingBox => "sing-box JSON",
        ClientConfigFormat::Clash => "Clash YAML",
        ClientConfigFormat::UriBundle => "URI bundle",
    }
}

/// Display label of a client application
#[must_use]
pub const fn app_label(app: ClientAppType) -> &'static str {
    match app {
        ClientAppType::SingBox => "sing-box",
        ClientAppType::Sfa => "sing-box for Android",
        ClientAppType::Sfi => "sing-box for Apple platforms",
        ClientAppType::ClashVerge => "Clash Verge",
        ClientAppType::ClashForWindows => "Clash for Windows",
        ClientAppType::Stash => "Stash",
        ClientAppType::V2rayN => "v2rayN",
        ClientAppType::V2rayNg => "v2rayNG",
        ClientAppType::Shadowrocket => "Shadowrocket",
        ClientAppType::NekoBox => "NekoBox",
    }
}

/// Display label of a proxy protocol
#[must_use]
pub const fn protocol_label(protocol: ProtocolType) -> &'static str {
    match protocol {
        ProtocolType::Shadowsocks => "Shadowsocks",
        ProtocolType::Vmess => "VMess",
        ProtocolType::Vless => "VLESS",
        ProtocolType::Trojan => "Trojan",
        ProtocolType::Hysteria => "Hysteria",
        ProtocolType::Hysteria2 => "Hysteria2",
        ProtocolType::Tuic => "TUIC",
    }
}

/// Display label of a deployed service kind
#[must_use]
pub const fn service_type_label(service_type: ServiceType) -> &'static str {
    match service_type {
        ServiceType::Shadowsocks => "Shadowsocks",
        ServiceType::Vmess => "VMess",
        ServiceType::Vless => "VLESS",
        ServiceType::Trojan => "Trojan",
        ServiceType::Hysteria => "Hysteria",
        ServiceType::Hysteria2 => "Hysteria2",
        ServiceType::Tuic => "TUIC",
        ServiceType::Other => "Other",
    }
}

/// Display label of a service status
#[must_use]
pub const fn service_status_label(status: ServiceStatus) -> &'static str {
    match status {
        ServiceStatus::Running => "Running",
        ServiceStatus::Stopped => "Stopped",
        ServiceStatus::Error => "Error",
        ServiceStatus::Unknown => "Unknown",
    }
}
