//! Property-based tests for document rendering

use proptest::prelude::*;
use uuid::Uuid;
use vpstools_core::{
    ClientAppType, ClientConfigFormat, ClientConfiguration, ConfigurationCompiler, ProtocolType,
};

fn arb_shadowsocks() -> impl Strategy<Value = ClientConfiguration> {
    (
        "[a-z]{1,10}\\.[a-z]{2,5}",
        1u16..=65535,
        "[a-zA-Z0-9!#$%&*+:;<=>?@^_-]{1,32}",
        proptest::option::of("[a-z]{2,8}-[0-9]{1,3}"),
    )
        .prop_map(|(server, port, password, remark)| {
            let config = ClientConfiguration::new(Uuid::nil(), ProtocolType::Shadowsocks, server, port)
                .with_method("aes-256-gcm")
                .with_password(password);
            match remark {
                Some(remark) => config.with_remark(remark),
                None => config,
            }
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Rendering the same configuration twice yields identical bytes
    #[test]
    fn prop_render_is_deterministic(config in arb_shadowsocks()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config).unwrap();

        for app in ClientAppType::all() {
            let first = compiler.render(id, app.format(), Some(*app)).unwrap();
            let second = compiler.render(id, app.format(), Some(*app)).unwrap();
            prop_assert_eq!(first, second);
        }
    }

    /// The sing-box document carries the endpoint unchanged
    #[test]
    fn prop_sing_box_carries_endpoint(config in arb_shadowsocks()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config.clone()).unwrap();

        let text = compiler.render(id, ClientConfigFormat::SingBox, None).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
        let outbound = &doc["outbounds"][0];
        prop_assert_eq!(outbound["server"].as_str(), Some(config.server_address.as_str()));
        prop_assert_eq!(outbound["server_port"].as_u64(), Some(u64::from(config.port)));
        prop_assert_eq!(outbound["password"].as_str(), config.password.as_deref());
        let tag = config.tag();
        prop_assert_eq!(outbound["tag"].as_str(), Some(tag.as_str()));
    }

    /// The Clash document carries the endpoint unchanged
    #[test]
    fn prop_clash_carries_endpoint(config in arb_shadowsocks()) {
        let mut compiler = ConfigurationCompiler::default();
        let id = compiler.register(config.clone()).unwrap();

        let text = compiler.render(id, ClientConfigFormat::Clash, None).unwrap();
        let doc: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
        let proxy = &doc["proxies"][0];
        prop_assert_eq!(proxy["server"].as_str(), Some(config.server_address.as_str()));
        prop_assert_eq!(proxy["port"].as_u64(), Some(u64::from(config.port)));
        prop_assert_eq!(proxy["password"].as_str(), config.password.as_deref());
        let tag = config.tag();
        prop_assert_eq!(proxy["name"].as_str(), Some(tag.as_str()));
    }
}
