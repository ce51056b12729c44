//! sing-box JSON rendering.

use serde_json::{Map, Value, json};

use super::endpoint::{ProtocolEndpoint, with_unique_tags};
use crate::error::{CompileError, CompileResult};
use crate::models::{ClientAppType, TlsConfig, TransportConfig, TransportType};

/// Local mixed (HTTP + SOCKS) listener for desktop clients
pub const MIXED_LISTEN_PORT: u16 = 2080;

/// Tag of the selector outbound emitted when more than one proxy is present
pub const SELECTOR_TAG: &str = "proxy";

/// Tag of the direct outbound
pub const DIRECT_TAG: &str = "direct";

/// Address assigned to the TUN interface on mobile clients
const TUN_ADDRESS: &str = "172.19.0.1/30";

/// Builds a single outbound object
#[must_use]
pub fn outbound(endpoint: &ProtocolEndpoint) -> Value {
    let base = endpoint.base();
    let mut out = Map::new();
    out.insert("tag".into(), json!(base.tag));
    out.insert("server".into(), json!(base.server));
    out.insert("server_port".into(), json!(base.port));

    match endpoint {
        ProtocolEndpoint::Shadowsocks {
            method, password, ..
        } => {
            out.insert("type".into(), json!("shadowsocks"));
            out.insert("method".into(), json!(method));
            out.insert("password".into(), json!(password));
        }
        ProtocolEndpoint::Vmess { uuid, security, .. } => {
            out.insert("type".into(), json!("vmess"));
            out.insert("uuid".into(), json!(uuid));
            out.insert("security".into(), json!(security));
            out.insert("alter_id".into(), json!(0));
        }
        ProtocolEndpoint::Vless { uuid, flow, .. } => {
            out.insert("type".into(), json!("vless"));
            out.insert("uuid".into(), json!(uuid));
            if let Some(flow) = flow {
                out.insert("flow".into(), json!(flow));
            }
        }
        ProtocolEndpoint::Trojan { password, .. } => {
            out.insert("type".into(), json!("trojan"));
            out.insert("password".into(), json!(password));
        }
        ProtocolEndpoint::Hysteria {
            auth, bandwidth, ..
        } => {
            out.insert("type".into(), json!("hysteria"));
            out.insert("auth_str".into(), json!(auth));
            out.insert("up_mbps".into(), json!(bandwidth.up_mbps));
            out.insert("down_mbps".into(), json!(bandwidth.down_mbps));
        }
        ProtocolEndpoint::Hysteria2 { password, .. } => {
            out.insert("type".into(), json!("hysteria2"));
            out.insert("password".into(), json!(password));
        }
        ProtocolEndpoint::Tuic {
            uuid,
            password,
            congestion_control,
            ..
        } => {
            out.insert("type".into(), json!("tuic"));
            out.insert("uuid".into(), json!(uuid));
            out.insert("password".into(), json!(password));
            if let Some(cc) = congestion_control {
                out.insert("congestion_control".into(), json!(cc));
            }
        }
    }

    if let Some(tls) = endpoint.tls() {
        out.insert("tls".into(), tls_block(tls));
    }
    if let Some(transport) = &base.transport {
        out.insert("transport".into(), transport_block(transport));
    }
    Value::Object(out)
}

fn tls_block(tls: &TlsConfig) -> Value {
    let mut block = Map::new();
    block.insert("enabled".into(), json!(true));
    if let Some(sni) = &tls.server_name {
        block.insert("server_name".into(), json!(sni));
    }
    block.insert("insecure".into(), json!(tls.allow_insecure));
    if let Some(alpn) = tls.alpn.as_ref().filter(|a| !a.is_empty()) {
        block.insert("alpn".into(), json!(alpn));
    }
    Value::Object(block)
}

fn transport_block(transport: &TransportConfig) -> Value {
    let mut block = Map::new();
    block.insert("type".into(), json!(transport.transport_type.as_str()));
    match transport.transport_type {
        TransportType::Ws => {
            if let Some(path) = &transport.path {
                block.insert("path".into(), json!(path));
            }
            if let Some(host) = &transport.host {
                block.insert("headers".into(), json!({ "Host": host }));
            }
        }
        TransportType::Grpc => {
            if let Some(service) = &transport.path {
                block.insert("service_name".into(), json!(service));
            }
        }
        TransportType::Http => {
            if let Some(path) = &transport.path {
                block.insert("path".into(), json!(path));
            }
            if let Some(host) = &transport.host {
                block.insert("host".into(), json!([host]));
            }
        }
        TransportType::HttpUpgrade => {
            if let Some(path) = &transport.path {
                block.insert("path".into(), json!(path));
            }
            if let Some(host) = &transport.host {
                block.insert("host".into(), json!(host));
            }
        }
        TransportType::Tcp => {}
    }
    Value::Object(block)
}

fn inbound(app: ClientAppType) -> Value {
    if app.uses_tun() {
        json!({
            "type": "tun",
            "tag": "tun-in",
            "address": [TUN_ADDRESS],
            "auto_route": true,
            "strict_route": true,
            "stack": "system",
        })
    } else {
        json!({
            "type": "mixed",
            "tag": "mixed-in",
            "listen": "127.0.0.1",
            "listen_port": MIXED_LISTEN_PORT,
        })
    }
}

/// Builds the complete sing-box document for the given endpoints
#[must_use]
pub fn document(endpoints: &[ProtocolEndpoint], app: ClientAppType) -> Value {
    let endpoints = with_unique_tags(endpoints, &[SELECTOR_TAG, DIRECT_TAG]);
    let mut outbounds: Vec<Value> = endpoints.iter().map(outbound).collect();
    let tags: Vec<&str> = endpoints.iter().map(ProtocolEndpoint::tag).collect();

    let final_tag = if tags.len() > 1 {
        outbounds.push(json!({
            "type": "selector",
            "tag": SELECTOR_TAG,
            "outbounds": tags,
            "default": tags[0],
        }));
        SELECTOR_TAG.to_string()
    } else {
        tags.first().map_or_else(|| DIRECT_TAG.to_string(), |t| (*t).to_string())
    };
    outbounds.push(json!({ "type": "direct", "tag": DIRECT_TAG }));

    json!({
        "log": { "level": "info", "timestamp": true },
        "dns": {
            "servers": [
                { "tag": "remote", "address": "tls://1.1.1.1", "detour": final_tag },
                { "tag": "local", "address": "local", "detour": DIRECT_TAG },
            ],
            "final": "remote",
        },
        "inbounds": [inbound(app)],
        "outbounds": outbounds,
        "route": {
            "auto_detect_interface": true,
            "final": final_tag,
        },
    })
}

/// Renders the document as pretty-printed JSON
pub fn render(endpoints: &[ProtocolEndpoint], app: ClientAppType) -> CompileResult<String> {
    serde_json::to_string_pretty(&document(endpoints, app))
        .map_err(|e| CompileError::Serialization(e.to_string()))
}
