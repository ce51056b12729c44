//! Fleet document persistence across coordinator restarts

use std::sync::Arc;

use uuid::Uuid;
use vpstools_core::{
    ClientConfiguration, ConfigManager, ConfigurationCompiler, FleetDocument, FleetStore,
    ProtocolType, ServiceStatus, ServiceType, VpsService,
};

use super::support::{FakeOpener, ScriptedProber, coordinator, instance};

#[tokio::test]
async fn roster_and_catalog_survive_restart() {
    let temp = tempfile::tempdir().unwrap();
    let store = FleetStore::in_dir(temp.path());

    let fleet = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));
    let vps = instance("edge", "192.0.2.100");
    let vps_id = vps.id;
    fleet.restore(vec![vps, instance("core", "192.0.2.101")]).await;
    fleet.test_all_connections().await;
    fleet
        .add_service(
            vps_id,
            VpsService::new("hy2", ServiceType::Hysteria2, "Hysteria2")
                .with_port(443)
                .with_status(ServiceStatus::Running),
        )
        .await
        .unwrap();

    let mut compiler = ConfigurationCompiler::default();
    let config_id = compiler
        .register(
            ClientConfiguration::new(vps_id, ProtocolType::Shadowsocks, "192.0.2.100", 8388)
                .with_method("chacha20-ietf-poly1305")
                .with_password("secret")
                .with_remark("edge ss"),
        )
        .unwrap();

    store
        .save(&FleetDocument::new(fleet.snapshot().await, compiler.snapshot()))
        .unwrap();

    let document = store.load().unwrap();
    let restarted = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));
    restarted.restore(document.instances).await;
    let mut reloaded = ConfigurationCompiler::default();
    reloaded.restore(document.configurations);

    assert_eq!(restarted.snapshot().await, fleet.snapshot().await);
    assert!(restarted.test_result(vps_id).await.is_none());
    assert!(restarted.needs_initial_probe_sweep().await);

    let edge = restarted.get_instance(vps_id).await.unwrap();
    assert_eq!(edge.services.len(), 1);
    assert!(edge.last_connected.is_some());

    assert_eq!(reloaded.get(config_id), compiler.get(config_id));
    assert_eq!(
        reloaded.generate_protocol_url(config_id).unwrap(),
        compiler.generate_protocol_url(config_id).unwrap()
    );
}

#[tokio::test]
async fn configurations_outlive_their_instance() {
    let temp = tempfile::tempdir().unwrap();
    let store = FleetStore::in_dir(temp.path());
    let orphan_vps = Uuid::new_v4();

    let mut compiler = ConfigurationCompiler::default();
    compiler
        .register(
            ClientConfiguration::new(orphan_vps, ProtocolType::Hysteria2, "192.0.2.110", 443)
                .with_password("pw")
                .with_tls(vpstools_core::TlsConfig::enabled_with_sni("edge.example.com")),
        )
        .unwrap();
    store
        .save(&FleetDocument::new(Vec::new(), compiler.snapshot()))
        .unwrap();

    let document = store.load().unwrap();
    assert!(document.instances.is_empty());
    assert_eq!(document.configurations.len(), 1);
    assert_eq!(document.configurations[0].vps_id, orphan_vps);
}

#[test]
fn config_manager_store_lives_in_config_dir() {
    let temp = tempfile::tempdir().unwrap();
    let manager = ConfigManager::with_config_dir(temp.path().to_path_buf());
    let store = manager.fleet_store();

    assert!(store.path().starts_with(temp.path()));
    assert!(store.load().unwrap().is_empty());

    let mut settings = manager.load_settings().unwrap();
    settings.probe.max_concurrency = 4;
    manager.save_settings(&settings).unwrap();
    assert_eq!(manager.load_settings().unwrap().probe.max_concurrency, 4);
}
