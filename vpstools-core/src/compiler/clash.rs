//! Clash / mihomo YAML rendering.
//!
//! Documents are built as ordered [`Mapping`]s so the output keeps a stable,
//! human-friendly key order.

use serde_yaml::{Mapping, Number, Value};

use super::endpoint::{ProtocolEndpoint, with_unique_tags};
use crate::error::{CompileError, CompileResult};
use crate::models::{ClientAppType, TlsConfig, TransportConfig, TransportType};

/// Name of the select group listing every proxy
pub const PROXY_GROUP: &str = "Proxy";

/// Names Clash resolves to built-in policies or to the select group
const RESERVED_NAMES: [&str; 5] = [PROXY_GROUP, "DIRECT", "REJECT", "REJECT-DROP", "PASS"];

/// Local mixed (HTTP + SOCKS) port
pub const MIXED_PORT: u16 = 7890;

/// SOCKS port for clients without mixed-port support
pub const SOCKS_PORT: u16 = 7891;

const RULES: [&str; 4] = [
    "DOMAIN-SUFFIX,local,DIRECT",
    "IP-CIDR,127.0.0.0/8,DIRECT,no-resolve",
    "IP-CIDR,192.168.0.0/16,DIRECT,no-resolve",
    "MATCH,Proxy",
];

fn s(value: &str) -> Value {
    Value::String(value.to_string())
}

fn n(value: u32) -> Value {
    Value::Number(Number::from(u64::from(value)))
}

/// Small builder over [`Mapping`] keeping insertion order
#[derive(Default)]
struct Entries(Mapping);

impl Entries {
    fn put(&mut self, key: &str, value: Value) -> &mut Self {
        self.0.insert(s(key), value);
        self
    }

    fn put_str(&mut self, key: &str, value: &str) -> &mut Self {
        self.put(key, s(value))
    }

    fn finish(self) -> Value {
        Value::Mapping(self.0)
    }
}

/// Builds a single proxy entry
#[must_use]
pub fn proxy(endpoint: &ProtocolEndpoint) -> Value {
    let base = endpoint.base();
    let mut p = Entries::default();
    p.put_str("name", &base.tag);

    match endpoint {
        ProtocolEndpoint::Shadowsocks {
            method, password, ..
        } => {
            p.put_str("type", "ss")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("cipher", method)
                .put_str("password", password)
                .put("udp", Value::Bool(true));
        }
        ProtocolEndpoint::Vmess {
            uuid,
            security,
            tls,
            ..
        } => {
            p.put_str("type", "vmess")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("uuid", uuid)
                .put("alterId", n(0))
                .put_str("cipher", security);
            put_tls(&mut p, tls.as_ref(), "servername");
        }
        ProtocolEndpoint::Vless { uuid, flow, tls, .. } => {
            p.put_str("type", "vless")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("uuid", uuid);
            if let Some(flow) = flow {
                p.put_str("flow", flow);
            }
            put_tls(&mut p, tls.as_ref(), "servername");
        }
        ProtocolEndpoint::Trojan { password, tls, .. } => {
            p.put_str("type", "trojan")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("password", password);
            put_tls(&mut p, Some(tls), "sni");
        }
        ProtocolEndpoint::Hysteria {
            auth,
            bandwidth,
            tls,
            ..
        } => {
            p.put_str("type", "hysteria")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("auth-str", auth)
                .put_str("up", &format!("{} Mbps", bandwidth.up_mbps))
                .put_str("down", &format!("{} Mbps", bandwidth.down_mbps))
                .put_str("protocol", "udp");
            put_tls(&mut p, Some(tls), "sni");
        }
        ProtocolEndpoint::Hysteria2 { password, tls, .. } => {
            p.put_str("type", "hysteria2")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("password", password);
            put_tls(&mut p, Some(tls), "sni");
        }
        ProtocolEndpoint::Tuic {
            uuid,
            password,
            congestion_control,
            tls,
            ..
        } => {
            p.put_str("type", "tuic")
                .put_str("server", &base.server)
                .put("port", n(base.port.into()))
                .put_str("uuid", uuid)
                .put_str("password", password);
            if let Some(cc) = congestion_control {
                p.put_str("congestion-controller", cc);
            }
            p.put_str("udp-relay-mode", "native");
            put_tls(&mut p, Some(tls), "sni");
        }
    }

    if let Some(transport) = &base.transport {
        put_transport(&mut p, transport);
    }
    p.finish()
}

fn put_tls(p: &mut Entries, tls: Option<&TlsConfig>, sni_key: &str) {
    let Some(tls) = tls else {
        return;
    };
    if sni_key == "servername" {
        p.put("tls", Value::Bool(true));
    }
    if let Some(sni) = &tls.server_name {
        p.put_str(sni_key, sni);
    }
    p.put("skip-cert-verify", Value::Bool(tls.allow_insecure));
    if let Some(alpn) = tls.alpn.as_ref().filter(|a| !a.is_empty()) {
        p.put("alpn", Value::Sequence(alpn.iter().map(|a| s(a)).collect()));
    }
}

fn put_transport(p: &mut Entries, transport: &TransportConfig) {
    match transport.transport_type {
        TransportType::Ws | TransportType::HttpUpgrade => {
            let mut opts = Entries::default();
            if let Some(path) = &transport.path {
                opts.put_str("path", path);
            }
            if let Some(host) = &transport.host {
                let mut headers = Entries::default();
                headers.put_str("Host", host);
                opts.put("headers", headers.finish());
            }
            if transport.transport_type == TransportType::HttpUpgrade {
                opts.put("v2ray-http-upgrade", Value::Bool(true));
            }
            p.put_str("network", "ws").put("ws-opts", opts.finish());
        }
        TransportType::Grpc => {
            let mut opts = Entries::default();
            if let Some(service) = &transport.path {
                opts.put_str("grpc-service-name", service);
            }
            p.put_str("network", "grpc").put("grpc-opts", opts.finish());
        }
        TransportType::Http => {
            let mut opts = Entries::default();
            if let Some(host) = &transport.host {
                opts.put("host", Value::Sequence(vec![s(host)]));
            }
            if let Some(path) = &transport.path {
                opts.put_str("path", path);
            }
            p.put_str("network", "h2").put("h2-opts", opts.finish());
        }
        TransportType::Tcp => {}
    }
}

/// Builds the complete Clash document for the given endpoints
#[must_use]
pub fn document(endpoints: &[ProtocolEndpoint], app: ClientAppType) -> Value {
    let mut doc = Entries::default();
    if app == ClientAppType::Stash {
        doc.put("port", n(MIXED_PORT.into()))
            .put("socks-port", n(SOCKS_PORT.into()));
    } else {
        doc.put("mixed-port", n(MIXED_PORT.into()));
    }
    doc.put("allow-lan", Value::Bool(false))
        .put_str("mode", "rule")
        .put_str("log-level", "info");
    if app == ClientAppType::ClashVerge {
        doc.put("unified-delay", Value::Bool(true))
            .put("tcp-concurrent", Value::Bool(true));
    }

    let endpoints = with_unique_tags(endpoints, &RESERVED_NAMES);
    doc.put(
        "proxies",
        Value::Sequence(endpoints.iter().map(proxy).collect()),
    );

    let mut members: Vec<Value> = endpoints.iter().map(|e| s(e.tag())).collect();
    members.push(s("DIRECT"));
    let mut group = Entries::default();
    group
        .put_str("name", PROXY_GROUP)
        .put_str("type", "select")
        .put("proxies", Value::Sequence(members));
    doc.put("proxy-groups", Value::Sequence(vec![group.finish()]));

    doc.put(
        "rules",
        Value::Sequence(RULES.iter().map(|r| s(r)).collect()),
    );
    doc.finish()
}

/// Renders the document as YAML
pub fn render(endpoints: &[ProtocolEndpoint], app: ClientAppType) -> CompileResult<String> {
    serde_yaml::to_string(&document(endpoints, app))
        .map_err(|e| CompileError::Serialization(e.to_string()))
}
