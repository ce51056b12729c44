//! Configuration compiler and export scenarios

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use uuid::Uuid;
use vpstools_core::{
    Bandwidth, ClientAppType, ClientConfigFormat, ClientConfiguration, CompileError,
    ConfigurationCompiler, ExportError, ExportLocation, FileExportSink, ProtocolType, TlsConfig,
    TransportConfig, TransportType,
};

const USER: &str = "b831381d-6324-4d53-ad4f-8cda48b30811";

fn tls() -> TlsConfig {
    TlsConfig::enabled_with_sni("vps.example.com")
}

/// One complete configuration per protocol
fn complete_configs(vps_id: Uuid) -> Vec<ClientConfiguration> {
    let mut hysteria = ClientConfiguration::new(vps_id, ProtocolType::Hysteria, "vps.example.com", 36712)
        .with_password("auth-string")
        .with_tls(tls());
    hysteria.bandwidth = Some(Bandwidth {
        up_mbps: 50,
        down_mbps: 200,
    });
    let mut tuic = ClientConfiguration::new(vps_id, ProtocolType::Tuic, "vps.example.com", 8443)
        .with_uuid(USER)
        .with_password("tuic-pass")
        .with_tls(tls());
    tuic.congestion_control = Some("bbr".to_string());

    vec![
        ClientConfiguration::new(vps_id, ProtocolType::Shadowsocks, "1.2.3.4", 8388)
            .with_method("aes-256-gcm")
            .with_password("p@ss"),
        ClientConfiguration::new(vps_id, ProtocolType::Vmess, "vps.example.com", 443)
            .with_uuid(USER)
            .with_transport(TransportConfig {
                transport_type: TransportType::Ws,
                path: Some("/vmess".to_string()),
                host: Some("vps.example.com".to_string()),
            })
            .with_tls(tls()),
        ClientConfiguration::new(vps_id, ProtocolType::Vless, "vps.example.com", 443)
            .with_uuid(USER)
            .with_tls(tls()),
        ClientConfiguration::new(vps_id, ProtocolType::Trojan, "vps.example.com", 443)
            .with_password("trojan-pass")
            .with_transport(TransportConfig {
                transport_type: TransportType::Grpc,
                path: Some("trojan-grpc".to_string()),
                host: None,
            })
            .with_tls(tls()),
        hysteria,
        ClientConfiguration::new(vps_id, ProtocolType::Hysteria2, "vps.example.com", 443)
            .with_password("hy2-pass")
            .with_tls(tls()),
        tuic,
    ]
}

#[test]
fn shadowsocks_uri_payload_is_exact() {
    let mut compiler = ConfigurationCompiler::default();
    let id = compiler
        .register(
            ClientConfiguration::new(Uuid::nil(), ProtocolType::Shadowsocks, "1.2.3.4", 8388)
                .with_method("aes-256-gcm")
                .with_password("p@ss"),
        )
        .unwrap();

    let uri = compiler.generate_protocol_url(id).unwrap();
    let encoded = uri
        .strip_prefix("ss://")
        .and_then(|rest| rest.split_once('#'))
        .map(|(payload, _)| payload)
        .unwrap();
    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded, "aes-256-gcm:p@ss@1.2.3.4:8388");
}

#[test]
fn missing_required_fields_fail_for_every_format() {
    let mut compiler = ConfigurationCompiler::default();
    let ss = compiler
        .register(
            ClientConfiguration::new(Uuid::nil(), ProtocolType::Shadowsocks, "1.2.3.4", 8388)
                .with_password("p"),
        )
        .unwrap();
    let vmess = compiler
        .register(ClientConfiguration::new(Uuid::nil(), ProtocolType::Vmess, "1.2.3.4", 443))
        .unwrap();

    for format in ClientConfigFormat::all() {
        assert_eq!(
            compiler.render(ss, *format, None),
            Err(CompileError::MissingField {
                protocol: ProtocolType::Shadowsocks,
                field: "method",
            })
        );
        assert_eq!(
            compiler.render(vmess, *format, None),
            Err(CompileError::MissingField {
                protocol: ProtocolType::Vmess,
                field: "uuid",
            })
        );
    }
    assert!(matches!(
        compiler.generate_protocol_url(vmess),
        Err(CompileError::MissingField { field: "uuid", .. })
    ));
}

#[test]
fn every_protocol_renders_for_every_supporting_app() {
    let mut compiler = ConfigurationCompiler::default();
    let ids: Vec<(ProtocolType, Uuid)> = complete_configs(Uuid::nil())
        .into_iter()
        .map(|c| (c.protocol_type, compiler.register(c).unwrap()))
        .collect();

    for (protocol, id) in &ids {
        for app in ClientAppType::all() {
            let rendered = compiler.render(*id, app.format(), Some(*app));
            if app.supports(*protocol) {
                let text = rendered.unwrap();
                assert!(!text.is_empty());
                assert_eq!(text, compiler.render(*id, app.format(), Some(*app)).unwrap());
            } else {
                assert!(matches!(
                    rendered,
                    Err(CompileError::UnsupportedProtocol { .. })
                ));
            }
        }
        assert!(compiler.generate_protocol_url(*id).is_ok());
    }
}

#[test]
fn mismatched_format_and_app_is_rejected() {
    let mut compiler = ConfigurationCompiler::default();
    let id = compiler
        .register(complete_configs(Uuid::nil()).remove(0))
        .unwrap();
    assert_eq!(
        compiler.render(id, ClientConfigFormat::Clash, Some(ClientAppType::Sfa)),
        Err(CompileError::UnsupportedCombination {
            format: ClientConfigFormat::Clash,
            app: ClientAppType::Sfa,
        })
    );
}

#[test]
fn sing_box_document_for_whole_vps() {
    let vps = Uuid::new_v4();
    let mut compiler = ConfigurationCompiler::default();
    for config in complete_configs(vps) {
        compiler.register(config).unwrap();
    }

    let text = compiler
        .render_for_vps(vps, ClientConfigFormat::SingBox, Some(ClientAppType::Sfi))
        .unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    let outbounds = doc["outbounds"].as_array().unwrap();

    assert_eq!(outbounds.len(), 7 + 2);
    assert_eq!(outbounds[7]["type"], "selector");
    assert_eq!(outbounds[8]["type"], "direct");
    assert_eq!(doc["inbounds"][0]["type"], "tun");
    assert_eq!(doc["route"]["final"], "proxy");
}

#[test]
fn clash_document_lists_every_proxy_in_group() {
    let vps = Uuid::new_v4();
    let mut compiler = ConfigurationCompiler::default();
    for config in complete_configs(vps) {
        compiler.register(config).unwrap();
    }

    let text = compiler
        .render_for_vps(vps, ClientConfigFormat::Clash, None)
        .unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    let proxies = doc["proxies"].as_sequence().unwrap();
    let group = doc["proxy-groups"][0]["proxies"].as_sequence().unwrap();

    assert_eq!(proxies.len(), 7);
    assert_eq!(group.len(), 8);
    assert_eq!(group.last().and_then(|v| v.as_str()), Some("DIRECT"));
}

#[test]
fn subscription_bundle_is_base64_for_v2rayn() {
    let vps = Uuid::new_v4();
    let mut compiler = ConfigurationCompiler::default();
    for config in complete_configs(vps) {
        compiler.register(config).unwrap();
    }

    let encoded = compiler
        .render_for_vps(vps, ClientConfigFormat::UriBundle, Some(ClientAppType::V2rayN))
        .unwrap();
    let plain = compiler
        .render_for_vps(vps, ClientConfigFormat::UriBundle, Some(ClientAppType::V2rayNg))
        .unwrap();

    let decoded = String::from_utf8(STANDARD.decode(encoded).unwrap()).unwrap();
    assert_eq!(decoded, plain);
    assert_eq!(plain.lines().count(), 7);
}

#[test]
fn imported_uri_renders_like_original() {
    let mut compiler = ConfigurationCompiler::default();
    for original in complete_configs(Uuid::nil()) {
        let id = compiler.register(original.clone()).unwrap();
        let uri = compiler.generate_protocol_url(id).unwrap();

        let imported = ConfigurationCompiler::parse_protocol_url(&uri, Uuid::nil()).unwrap();
        assert_eq!(imported.protocol_type, original.protocol_type);
        assert_eq!(imported.server_address, original.server_address);
        assert_eq!(imported.port, original.port);
        assert_eq!(imported.password, original.password);
        assert_eq!(imported.uuid, original.uuid);
        assert_eq!(imported.transport, original.transport);
        assert_eq!(imported.tls, original.tls);
        assert_eq!(imported.bandwidth, original.bandwidth);
        assert_eq!(imported.congestion_control, original.congestion_control);

        let imported_id = compiler.register(imported).unwrap();
        assert_eq!(compiler.generate_protocol_url(imported_id).unwrap(), uri);
    }
}

#[tokio::test]
async fn export_writes_file_named_after_endpoint() {
    let temp = tempfile::tempdir().unwrap();
    let sink = Arc::new(FileExportSink::new(temp.path().join("exports")));
    let mut compiler = ConfigurationCompiler::new(sink);
    let id = compiler
        .register(complete_configs(Uuid::nil()).remove(0))
        .unwrap();

    let location = compiler
        .export_config(id, ClientConfigFormat::SingBox, None)
        .await
        .unwrap();
    let expected = temp.path().join("exports/shadowsocks_1.2.3.4_8388.json");
    assert_eq!(location, ExportLocation::File(expected.clone()));

    let written = std::fs::read_to_string(expected).unwrap();
    assert_eq!(
        written,
        compiler.render(id, ClientConfigFormat::SingBox, None).unwrap()
    );
}

#[tokio::test]
async fn export_failure_is_distinct_from_render_failure() {
    let temp = tempfile::tempdir().unwrap();
    let blocker = temp.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let mut compiler = ConfigurationCompiler::new(Arc::new(FileExportSink::new(&blocker)));
    let id = compiler
        .register(complete_configs(Uuid::nil()).remove(0))
        .unwrap();

    assert!(matches!(
        compiler.export_config(id, ClientConfigFormat::Clash, None).await,
        Err(ExportError::Failed(_))
    ));
    assert!(matches!(
        compiler
            .export_config(Uuid::new_v4(), ClientConfigFormat::Clash, None)
            .await,
        Err(ExportError::Render(CompileError::UnknownConfiguration(_)))
    ));
}
