//! Share-link (URI) rendering and parsing.
//!
//! Every value placed in a URI component is percent-encoded so that only
//! RFC 3986 unreserved characters stay literal. Query parameters are
//! emitted in a fixed order per protocol.

use std::borrow::Cow;

use base64::Engine;
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD, URL_SAFE_NO_PAD};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use super::endpoint::ProtocolEndpoint;
use crate::error::{CompileError, CompileResult};
use crate::models::{
    Bandwidth, ClientAppType, ClientConfiguration, ProtocolType, TlsConfig, TransportConfig,
    TransportType,
};

/// Characters that are percent-encoded in every URI component
const COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

fn enc(value: &str) -> String {
    utf8_percent_encode(value, COMPONENT).to_string()
}

fn dec(value: &str) -> CompileResult<String> {
    percent_decode_str(value)
        .decode_utf8()
        .map(Cow::into_owned)
        .map_err(|e| CompileError::MalformedUri(format!("invalid percent-encoding: {e}")))
}

fn host_component(host: &str) -> String {
    if host.contains(':') {
        format!("[{host}]")
    } else {
        enc(host)
    }
}

/// Decodes standard or URL-safe base64, with or without padding
fn base64_decode(input: &str) -> CompileResult<String> {
    let input = input.trim().trim_end_matches('=');
    let bytes = if input.contains('_') || input.contains('-') {
        URL_SAFE_NO_PAD.decode(input)
    } else {
        STANDARD_NO_PAD.decode(input)
    }
    .map_err(|e| CompileError::MalformedUri(format!("invalid base64: {e}")))?;
    String::from_utf8(bytes).map_err(|e| CompileError::MalformedUri(format!("invalid UTF-8: {e}")))
}

/// Ordered query-string builder
#[derive(Default)]
struct Query(Vec<(&'static str, String)>);

impl Query {
    fn push(&mut self, key: &'static str, value: impl Into<String>) -> &mut Self {
        self.0.push((key, value.into()));
        self
    }

    fn push_opt(&mut self, key: &'static str, value: Option<&str>) -> &mut Self {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            self.push(key, value);
        }
        self
    }

    fn push_flag(&mut self, key: &'static str, enabled: bool) -> &mut Self {
        if enabled {
            self.push(key, "1");
        }
        self
    }

    fn push_tls(&mut self, tls: &TlsConfig, sni_key: &'static str, insecure_key: &'static str) {
        self.push_opt(sni_key, tls.server_name.as_deref());
        self.push_opt("alpn", alpn_value(tls).as_deref());
        self.push_flag(insecure_key, tls.allow_insecure);
    }

    fn push_transport(&mut self, transport: Option<&TransportConfig>) {
        let Some(transport) = transport else {
            self.push("type", TransportType::Tcp.as_str());
            return;
        };
        self.push("type", transport.transport_type.as_str());
        if transport.transport_type == TransportType::Grpc {
            self.push_opt("serviceName", transport.path.as_deref());
        } else {
            self.push_opt("path", transport.path.as_deref());
        }
        self.push_opt("host", transport.host.as_deref());
    }

    fn encode(&self) -> String {
        self.0
            .iter()
            .map(|(k, v)| format!("{k}={}", enc(v)))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn alpn_value(tls: &TlsConfig) -> Option<String> {
    tls.alpn
        .as_ref()
        .filter(|a| !a.is_empty())
        .map(|a| a.join(","))
}

/// Renders one endpoint as a share link
#[must_use]
pub fn generate(endpoint: &ProtocolEndpoint) -> String {
    let base = endpoint.base();
    let host = host_component(&base.server);
    let port = base.port;
    let fragment = enc(&base.tag);

    match endpoint {
        ProtocolEndpoint::Shadowsocks {
            method, password, ..
        } => {
            let payload = format!("{method}:{password}@{}:{port}", host_literal(&base.server));
            format!("ss://{}#{fragment}", STANDARD.encode(payload))
        }
        ProtocolEndpoint::Vmess {
            uuid,
            security,
            tls,
            ..
        } => format!("vmess://{}", STANDARD.encode(vmess_json(endpoint, uuid, security, tls.as_ref()))),
        ProtocolEndpoint::Vless { uuid, flow, tls, .. } => {
            let mut query = Query::default();
            query.push("encryption", "none").push_opt("flow", flow.as_deref());
            match tls {
                Some(tls) => {
                    query.push("security", "tls");
                    query.push_tls(tls, "sni", "allowInsecure");
                }
                None => {
                    query.push("security", "none");
                }
            }
            query.push_transport(base.transport.as_ref());
            format!("vless://{}@{host}:{port}?{}#{fragment}", enc(uuid), query.encode())
        }
        ProtocolEndpoint::Trojan { password, tls, .. } => {
            let mut query = Query::default();
            query.push("security", "tls");
            query.push_tls(tls, "sni", "allowInsecure");
            query.push_transport(base.transport.as_ref());
            format!("trojan://{}@{host}:{port}?{}#{fragment}", enc(password), query.encode())
        }
        ProtocolEndpoint::Hysteria {
            auth,
            bandwidth,
            tls,
            ..
        } => {
            let mut query = Query::default();
            query
                .push("protocol", "udp")
                .push("auth", auth.as_str())
                .push_opt("peer", tls.server_name.as_deref())
                .push_flag("insecure", tls.allow_insecure)
                .push("upmbps", bandwidth.up_mbps.to_string())
                .push("downmbps", bandwidth.down_mbps.to_string())
                .push_opt("alpn", alpn_value(tls).as_deref());
            format!("hysteria://{host}:{port}?{}#{fragment}", query.encode())
        }
        ProtocolEndpoint::Hysteria2 { password, tls, .. } => {
            let mut query = Query::default();
            query
                .push_opt("sni", tls.server_name.as_deref())
                .push_flag("insecure", tls.allow_insecure)
                .push_opt("alpn", alpn_value(tls).as_deref());
            let query = query.encode();
            let separator = if query.is_empty() { "" } else { "?" };
            format!("hysteria2://{}@{host}:{port}/{separator}{query}#{fragment}", enc(password))
        }
        ProtocolEndpoint::Tuic {
            uuid,
            password,
            congestion_control,
            tls,
            ..
        } => {
            let mut query = Query::default();
            query.push_opt("congestion_control", congestion_control.as_deref());
            query.push_tls(tls, "sni", "allow_insecure");
            let query = query.encode();
            let separator = if query.is_empty() { "" } else { "?" };
            format!(
                "tuic://{}:{}@{host}:{port}{separator}{query}#{fragment}",
                enc(uuid),
                enc(password)
            )
        }
    }
}

fn host_literal(host: &str) -> Cow<'_, str> {
    if host.contains(':') {
        Cow::Owned(format!("[{host}]"))
    } else {
        Cow::Borrowed(host)
    }
}

fn vmess_json(
    endpoint: &ProtocolEndpoint,
    uuid: &str,
    security: &str,
    tls: Option<&TlsConfig>,
) -> String {
    let base = endpoint.base();
    let transport = base.transport.as_ref();
    let net = match transport.map(|t| t.transport_type) {
        Some(TransportType::Http) => "h2",
        Some(other) => other.as_str(),
        None => TransportType::Tcp.as_str(),
    };

    let mut doc = Map::new();
    doc.insert("v".into(), json!("2"));
    doc.insert("ps".into(), json!(base.tag));
    doc.insert("add".into(), json!(base.server));
    doc.insert("port".into(), json!(base.port.to_string()));
    doc.insert("id".into(), json!(uuid));
    doc.insert("aid".into(), json!("0"));
    doc.insert("scy".into(), json!(security));
    doc.insert("net".into(), json!(net));
    doc.insert("type".into(), json!("none"));
    doc.insert(
        "host".into(),
        json!(transport.and_then(|t| t.host.as_deref()).unwrap_or_default()),
    );
    doc.insert(
        "path".into(),
        json!(transport.and_then(|t| t.path.as_deref()).unwrap_or_default()),
    );
    doc.insert("tls".into(), json!(if tls.is_some() { "tls" } else { "" }));
    doc.insert(
        "sni".into(),
        json!(tls.and_then(|t| t.server_name.as_deref()).unwrap_or_default()),
    );
    doc.insert(
        "alpn".into(),
        json!(tls.and_then(alpn_value).unwrap_or_default()),
    );
    doc.insert(
        "allowInsecure".into(),
        json!(tls.is_some_and(|t| t.allow_insecure)),
    );
    Value::Object(doc).to_string()
}

/// Joins share links into a subscription body for the given app
#[must_use]
pub fn bundle(links: &[String], app: ClientAppType) -> String {
    let text = links.join("\n");
    if app.wants_base64_bundle() {
        STANDARD.encode(text)
    } else {
        text
    }
}

/// Components of a `scheme://[userinfo@]host:port[/][?query][#fragment]` link
struct LinkParts {
    userinfo: Option<String>,
    host: String,
    port: u16,
    query: Vec<(String, String)>,
    fragment: Option<String>,
}

impl LinkParts {
    fn parse(rest: &str) -> CompileResult<Self> {
        let (rest, fragment) = match rest.split_once('#') {
            Some((r, f)) => (r, Some(dec(f)?)),
            None => (rest, None),
        };
        let (authority, query) = rest.split_once('?').unwrap_or((rest, ""));
        let authority = authority.trim_end_matches('/');
        let (userinfo, hostport) = match authority.rsplit_once('@') {
            Some((u, h)) => (Some(u.to_string()), h),
            None => (None, authority),
        };
        let (host, port) = split_host_port(hostport)?;

        let query = query
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
                Ok((dec(k)?, dec(v)?))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        Ok(Self {
            userinfo,
            host,
            port,
            query,
            fragment,
        })
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    fn flag(&self, key: &str) -> bool {
        matches!(self.get(key), Some("1" | "true"))
    }

    fn require(&self, key: &str) -> CompileResult<&str> {
        self.get(key)
            .ok_or_else(|| CompileError::MalformedUri(format!("missing '{key}' parameter")))
    }

    fn userinfo(&self) -> CompileResult<&str> {
        self.userinfo
            .as_deref()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| CompileError::MalformedUri("missing credentials".to_string()))
    }

    fn tls(&self, sni_keys: &[&str], insecure_key: &str) -> TlsConfig {
        TlsConfig {
            enabled: true,
            server_name: sni_keys
                .iter()
                .find_map(|k| self.get(k))
                .map(str::to_string),
            allow_insecure: self.flag(insecure_key),
            alpn: self.get("alpn").map(split_alpn),
        }
    }

    fn transport(&self) -> CompileResult<Option<TransportConfig>> {
        let transport_type: TransportType = self
            .get("type")
            .unwrap_or("tcp")
            .parse()
            .map_err(CompileError::MalformedUri)?;
        let path = if transport_type == TransportType::Grpc {
            self.get("serviceName")
        } else {
            self.get("path")
        };
        Ok(build_transport(
            transport_type,
            path.map(str::to_string),
            self.get("host").map(str::to_string),
        ))
    }
}

fn split_alpn(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

fn build_transport(
    transport_type: TransportType,
    path: Option<String>,
    host: Option<String>,
) -> Option<TransportConfig> {
    if transport_type == TransportType::Tcp && path.is_none() && host.is_none() {
        return None;
    }
    Some(TransportConfig {
        transport_type,
        path,
        host,
    })
}

fn split_host_port(hostport: &str) -> CompileResult<(String, u16)> {
    let malformed = || CompileError::MalformedUri(format!("invalid host:port '{hostport}'"));
    let (host, port) = if let Some(bracketed) = hostport.strip_prefix('[') {
        let (host, rest) = bracketed.split_once(']').ok_or_else(malformed)?;
        let port = rest.strip_prefix(':').ok_or_else(malformed)?;
        (host.to_string(), port)
    } else {
        let (host, port) = hostport.rsplit_once(':').ok_or_else(malformed)?;
        (dec(host)?, port)
    };
    let port: u16 = port.parse().map_err(|_| malformed())?;
    if host.is_empty() || port == 0 {
        return Err(malformed());
    }
    Ok((host, port))
}

/// Applies a display tag, dropping it when it equals the generated default
fn apply_remark(mut config: ClientConfiguration, remark: Option<String>) -> ClientConfiguration {
    if let Some(remark) = remark.filter(|r| !r.is_empty()) {
        if remark != config.tag() {
            config.remark = Some(remark);
        }
    }
    config
}

/// Parses a share link back into a configuration owned by `vps_id`
pub fn parse(uri: &str, vps_id: Uuid) -> CompileResult<ClientConfiguration> {
    let uri = uri.trim();
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| CompileError::MalformedUri("missing scheme".to_string()))?;

    match scheme.to_lowercase().as_str() {
        "ss" => parse_shadowsocks(rest, vps_id),
        "vmess" => parse_vmess(rest, vps_id),
        "vless" => {
            let parts = LinkParts::parse(rest)?;
            let mut config =
                ClientConfiguration::new(vps_id, ProtocolType::Vless, &parts.host, parts.port)
                    .with_uuid(dec(parts.userinfo()?)?);
            config.flow = parts.get("flow").map(str::to_string);
            if matches!(parts.get("security"), Some("tls")) {
                config.tls = Some(parts.tls(&["sni"], "allowInsecure"));
            }
            config.transport = parts.transport()?;
            Ok(apply_remark(config, parts.fragment))
        }
        "trojan" => {
            let parts = LinkParts::parse(rest)?;
            let mut config =
                ClientConfiguration::new(vps_id, ProtocolType::Trojan, &parts.host, parts.port)
                    .with_password(dec(parts.userinfo()?)?)
                    .with_tls(parts.tls(&["sni", "peer"], "allowInsecure"));
            config.transport = parts.transport()?;
            Ok(apply_remark(config, parts.fragment))
        }
        "hysteria" => {
            let parts = LinkParts::parse(rest)?;
            let bandwidth = Bandwidth {
                up_mbps: parse_mbps(parts.require("upmbps")?)?,
                down_mbps: parse_mbps(parts.require("downmbps")?)?,
            };
            let mut config =
                ClientConfiguration::new(vps_id, ProtocolType::Hysteria, &parts.host, parts.port)
                    .with_password(parts.require("auth")?)
                    .with_tls(parts.tls(&["peer", "sni"], "insecure"));
            config.bandwidth = Some(bandwidth);
            Ok(apply_remark(config, parts.fragment))
        }
        "hysteria2" | "hy2" => {
            let parts = LinkParts::parse(rest)?;
            let config =
                ClientConfiguration::new(vps_id, ProtocolType::Hysteria2, &parts.host, parts.port)
                    .with_password(dec(parts.userinfo()?)?)
                    .with_tls(parts.tls(&["sni", "peer"], "insecure"));
            Ok(apply_remark(config, parts.fragment))
        }
        "tuic" => {
            let parts = LinkParts::parse(rest)?;
            let (uuid, password) = parts.userinfo()?.split_once(':').ok_or_else(|| {
                CompileError::MalformedUri("tuic credentials must be uuid:password".to_string())
            })?;
            let mut config =
                ClientConfiguration::new(vps_id, ProtocolType::Tuic, &parts.host, parts.port)
                    .with_uuid(dec(uuid)?)
                    .with_password(dec(password)?)
                    .with_tls(parts.tls(&["sni"], "allow_insecure"));
            config.congestion_control = parts.get("congestion_control").map(str::to_string);
            Ok(apply_remark(config, parts.fragment))
        }
        other => Err(CompileError::UnsupportedProtocol {
            protocol: other.to_string(),
            target: "uri".to_string(),
        }),
    }
}

fn parse_mbps(value: &str) -> CompileResult<u32> {
    value
        .trim()
        .parse()
        .map_err(|_| CompileError::MalformedUri(format!("invalid bandwidth '{value}'")))
}

fn parse_shadowsocks(rest: &str, vps_id: Uuid) -> CompileResult<ClientConfiguration> {
    let (body, remark) = match rest.split_once('#') {
        Some((b, f)) => (b, Some(dec(f)?)),
        None => (rest, None),
    };
    let body = body.split_once('?').map_or(body, |(b, _)| b);
    let body = body.trim_end_matches('/');

    // SIP002 keeps host:port in clear text after the userinfo
    let (credentials, host, port) = if let Some((userinfo, hostport)) = body.rsplit_once('@') {
        let credentials = base64_decode(userinfo).or_else(|_| dec(userinfo))?;
        let (host, port) = split_host_port(hostport)?;
        (credentials, host, port)
    } else {
        let decoded = base64_decode(body)?;
        let (credentials, hostport) = decoded
            .rsplit_once('@')
            .ok_or_else(|| CompileError::MalformedUri("missing server in payload".to_string()))?;
        let (host, port) = split_host_port(hostport)?;
        (credentials.to_string(), host, port)
    };

    let (method, password) = credentials
        .split_once(':')
        .ok_or_else(|| CompileError::MalformedUri("credentials must be method:password".to_string()))?;
    let config = ClientConfiguration::new(vps_id, ProtocolType::Shadowsocks, host, port)
        .with_method(method)
        .with_password(password);
    Ok(apply_remark(config, remark))
}

fn json_str<'a>(doc: &'a Value, key: &str) -> Option<&'a str> {
    doc.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn json_flag(doc: &Value, key: &str) -> bool {
    match doc.get(key) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s == "1" || s == "true",
        Some(Value::Number(n)) => n.as_u64() == Some(1),
        _ => false,
    }
}

fn parse_vmess(rest: &str, vps_id: Uuid) -> CompileResult<ClientConfiguration> {
    let body = rest.split_once('#').map_or(rest, |(b, _)| b);
    let decoded = base64_decode(body)?;
    let doc: Value = serde_json::from_str(&decoded)
        .map_err(|e| CompileError::MalformedUri(format!("invalid vmess JSON: {e}")))?;
    let missing = |key: &str| CompileError::MalformedUri(format!("vmess JSON lacks '{key}'"));

    let host = json_str(&doc, "add").ok_or_else(|| missing("add"))?;
    let port = match doc.get("port") {
        Some(Value::Number(n)) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|p| *p != 0)
    .ok_or_else(|| missing("port"))?;
    let uuid = json_str(&doc, "id").ok_or_else(|| missing("id"))?;

    let mut config = ClientConfiguration::new(vps_id, ProtocolType::Vmess, host, port).with_uuid(uuid);
    config.method = json_str(&doc, "scy").map(str::to_string);

    let transport_type: TransportType = json_str(&doc, "net")
        .unwrap_or("tcp")
        .parse()
        .map_err(CompileError::MalformedUri)?;
    config.transport = build_transport(
        transport_type,
        json_str(&doc, "path").map(str::to_string),
        json_str(&doc, "host").map(str::to_string),
    );

    if json_str(&doc, "tls") == Some("tls") {
        config.tls = Some(TlsConfig {
            enabled: true,
            server_name: json_str(&doc, "sni").map(str::to_string),
            allow_insecure: json_flag(&doc, "allowInsecure"),
            alpn: json_str(&doc, "alpn").map(split_alpn),
        });
    }

    Ok(apply_remark(config, json_str(&doc, "ps").map(str::to_string)))
}
