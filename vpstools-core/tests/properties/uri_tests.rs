//! Property-based tests for share-link generation and parsing
//!
//! Links produced for a complete configuration parse back into the same
//! endpoint, and the parsed configuration renders the identical link.

use proptest::prelude::*;
use uuid::Uuid;
use vpstools_core::{ClientConfiguration, ConfigurationCompiler, ProtocolType, TlsConfig};

/// Strategy for server addresses: DNS names, IPv4 and IPv6 literals
fn arb_server() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,10}\\.[a-z]{2,5}",
        (1u8..=254, 0u8..=255, 0u8..=255, 1u8..=254)
            .prop_map(|(a, b, c, d)| format!("{a}.{b}.{c}.{d}")),
        "[0-9a-f]{1,4}".prop_map(|tail| format!("2001:db8::{tail}")),
    ]
}

/// Strategy for secrets with URI-significant characters
fn arb_secret() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9@:/?#&=%+ !~._-]{1,24}"
}

fn arb_sni() -> impl Strategy<Value = String> {
    "[a-z]{1,10}\\.example\\.com"
}

/// Strategy for complete configurations of password-based protocols
fn arb_config() -> impl Strategy<Value = ClientConfiguration> {
    let protocol = prop_oneof![
        Just(ProtocolType::Shadowsocks),
        Just(ProtocolType::Vmess),
        Just(ProtocolType::Vless),
        Just(ProtocolType::Trojan),
        Just(ProtocolType::Hysteria2),
        Just(ProtocolType::Tuic),
    ];
    let method = prop_oneof![
        Just("aes-128-gcm"),
        Just("aes-256-gcm"),
        Just("chacha20-ietf-poly1305"),
        Just("2022-blake3-aes-256-gcm"),
    ];

    (protocol, arb_server(), 1u16..=65535, arb_secret(), method, arb_sni(), any::<bool>())
        .prop_map(|(protocol, server, port, secret, method, sni, insecure)| {
            let mut tls = TlsConfig::enabled_with_sni(sni);
            tls.allow_insecure = insecure;
            let config = ClientConfiguration::new(Uuid::nil(), protocol, server, port);
            match protocol {
                ProtocolType::Shadowsocks => config.with_method(method).with_password(secret),
                ProtocolType::Vmess | ProtocolType::Vless => {
                    config.with_uuid(Uuid::new_v4().to_string()).with_tls(tls)
                }
                ProtocolType::Tuic => config
                    .with_uuid(Uuid::new_v4().to_string())
                    .with_password(secret)
                    .with_tls(tls),
                _ => config.with_password(secret).with_tls(tls),
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// A generated link parses back into the same endpoint fields
    #[test]
    fn prop_link_preserves_endpoint(config in arb_config()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config.clone()).unwrap();
        let link = compiler.generate_protocol_url(id).unwrap();

        let parsed = ConfigurationCompiler::parse_protocol_url(&link, Uuid::nil()).unwrap();
        prop_assert_eq!(parsed.protocol_type, config.protocol_type);
        prop_assert_eq!(&parsed.server_address, &config.server_address);
        prop_assert_eq!(parsed.port, config.port);
        prop_assert_eq!(&parsed.password, &config.password);
        prop_assert_eq!(&parsed.uuid, &config.uuid);
        prop_assert_eq!(&parsed.tls, &config.tls);
        prop_assert!(parsed.remark.is_none());
    }

    /// Re-rendering a parsed link yields the identical link
    #[test]
    fn prop_parsed_link_renders_identically(config in arb_config()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config).unwrap();
        let link = compiler.generate_protocol_url(id).unwrap();

        let parsed = ConfigurationCompiler::parse_protocol_url(&link, Uuid::nil()).unwrap();
        let reparsed_id = compiler.register(parsed).unwrap();
        prop_assert_eq!(compiler.generate_protocol_url(reparsed_id).unwrap(), link);
    }

    /// Links never carry unescaped whitespace
    #[test]
    fn prop_link_has_no_whitespace(config in arb_config()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config).unwrap();
        let link = compiler.generate_protocol_url(id).unwrap();
        prop_assert!(!link.chars().any(char::is_whitespace));
    }
}
