//! Fleet coordinator scenarios

use std::sync::Arc;
use std::time::{Duration, Instant};

use uuid::Uuid;
use vpstools_core::{
    ClientConfiguration, ConfigurationCompiler, FleetError, ProtocolType, ServiceType, VpsDraft,
    VpsPatch, VpsService,
};

use super::support::{FakeOpener, ScriptedProber, coordinator, instance};

#[tokio::test]
async fn unreachable_admission_leaves_roster_unchanged() {
    let prober = Arc::new(ScriptedProber::new().unreachable_host("203.0.113.9"));
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));

    let draft = VpsDraft::with_password("203.0.113.9", 22, "root", "secret").named("dead");
    let err = fleet.add_instance(draft).await.unwrap_err();

    assert!(matches!(err, FleetError::ConnectionFailed(_)));
    assert_eq!(fleet.len().await, 0);
    assert_eq!(prober.calls_for("203.0.113.9"), 1);
}

#[tokio::test]
async fn rejected_credentials_are_reported_with_reason() {
    let prober = Arc::new(ScriptedProber::new().rejecting_host("198.51.100.7"));
    let fleet = coordinator(prober, Arc::new(FakeOpener::new()));

    let draft = VpsDraft::with_password("198.51.100.7", 22, "root", "wrong");
    match fleet.add_instance(draft).await {
        Err(FleetError::ConnectionFailed(reason)) => assert!(reason.contains("permission denied")),
        other => panic!("unexpected admission outcome: {other:?}"),
    }
    assert!(fleet.is_empty().await);
}

#[tokio::test]
async fn successful_admission_records_probe() {
    let fleet = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));

    let draft = VpsDraft::with_password("192.0.2.10", 2222, "admin", "secret").named("edge-1");
    let added = fleet.add_instance(draft).await.unwrap();

    assert_eq!(added.port, 2222);
    assert!(added.last_connected.is_some());
    let result = fleet.test_result(added.id).await.unwrap();
    assert!(result.is_success());
    assert!(!fleet.needs_initial_probe_sweep().await);
}

#[tokio::test]
async fn invalid_draft_fails_before_any_probe() {
    let prober = Arc::new(ScriptedProber::new());
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));

    let draft = VpsDraft::with_password("", 22, "root", "secret");
    assert!(matches!(
        fleet.add_instance(draft).await,
        Err(FleetError::InvalidConfiguration(_))
    ));
    assert_eq!(prober.total_calls(), 0);
}

#[tokio::test]
async fn probes_of_whole_fleet_run_concurrently() {
    let delay = Duration::from_millis(300);
    let prober = Arc::new(ScriptedProber::new().with_delay(delay));
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));
    fleet
        .restore(vec![
            instance("alpha", "192.0.2.1"),
            instance("bravo", "192.0.2.2"),
            instance("charlie", "192.0.2.3"),
        ])
        .await;

    let started = Instant::now();
    let summary = fleet.test_all_connections().await;
    let elapsed = started.elapsed();

    assert_eq!(summary.total, 3);
    assert!(summary.all_passed());
    assert!(
        elapsed < delay * 2,
        "three probes took {elapsed:?}, expected about one probe duration"
    );
    let names: Vec<&str> = summary.results.iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["alpha", "bravo", "charlie"]);
}

#[tokio::test]
async fn concurrent_tests_share_one_probe() {
    let prober = Arc::new(ScriptedProber::new().with_delay(Duration::from_millis(200)));
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));
    let vps = instance("solo", "192.0.2.50");
    let id = vps.id;
    fleet.restore(vec![vps]).await;

    let (first, second, third) = tokio::join!(
        fleet.test_connection(id),
        fleet.test_connection(id),
        fleet.test_connection(id)
    );

    assert_eq!(prober.calls_for("192.0.2.50"), 1);
    let first = first.unwrap();
    assert_eq!(first, second.unwrap());
    assert_eq!(first, third.unwrap());
    assert!(!fleet.is_in_flight(id).await);
}

#[tokio::test]
async fn abandoned_waiter_does_not_leave_stale_marker() {
    let prober = Arc::new(ScriptedProber::new().with_delay(Duration::from_millis(100)));
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));
    let vps = instance("solo", "192.0.2.51");
    let id = vps.id;
    fleet.restore(vec![vps]).await;

    let waiter = {
        let fleet = fleet.clone();
        tokio::spawn(async move { fleet.test_connection(id).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(fleet.is_in_flight(id).await);
    waiter.abort();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(!fleet.is_in_flight(id).await);
    assert!(fleet.test_result(id).await.is_some());

    fleet.test_connection(id).await.unwrap();
    assert_eq!(prober.calls_for("192.0.2.51"), 2);
}

#[tokio::test]
async fn sequential_tests_probe_again() {
    let prober = Arc::new(ScriptedProber::new());
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));
    let vps = instance("solo", "192.0.2.52");
    let id = vps.id;
    fleet.restore(vec![vps]).await;

    fleet.test_connection(id).await.unwrap();
    fleet.test_connection(id).await.unwrap();
    assert_eq!(prober.calls_for("192.0.2.52"), 2);
}

#[tokio::test]
async fn telemetry_flow_after_successful_probe() {
    let opener = Arc::new(FakeOpener::new());
    let fleet = coordinator(Arc::new(ScriptedProber::new()), opener.clone());
    let vps = instance("db", "192.0.2.60");
    let id = vps.id;
    fleet.restore(vec![vps]).await;

    assert!(matches!(
        fleet.get_system_info(id).await,
        Err(FleetError::NotConnected(_))
    ));
    assert_eq!(opener.opened(), 0);

    fleet.test_connection(id).await.unwrap();
    let info = fleet.get_system_info(id).await.unwrap();

    assert_eq!(info.os_name, "Debian GNU/Linux 12 (bookworm)");
    assert_eq!(info.cpu_cores, 4);
    assert!((info.memory_usage - 75.0).abs() < 0.01);
    assert!((info.disk_usage - 25.0).abs() < 0.01);
    assert_eq!(info.uptime_secs, 3600);

    let stored = fleet.get_instance(id).await.unwrap();
    assert_eq!(stored.system_info, Some(info));
}

#[tokio::test]
async fn telemetry_session_failure_is_connection_failure() {
    let opener = Arc::new(FakeOpener::new().refusing_host("192.0.2.61"));
    let fleet = coordinator(Arc::new(ScriptedProber::new()), opener);
    let vps = instance("db", "192.0.2.61");
    let id = vps.id;
    fleet.restore(vec![vps]).await;

    fleet.test_connection(id).await.unwrap();
    assert!(matches!(
        fleet.get_system_info(id).await,
        Err(FleetError::ConnectionFailed(_))
    ));
    assert!(fleet.get_instance(id).await.unwrap().system_info.is_none());
}

#[tokio::test]
async fn unknown_ids_are_not_found() {
    let fleet = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));
    let id = Uuid::new_v4();

    assert!(matches!(fleet.test_connection(id).await, Err(FleetError::NotFound(_))));
    assert!(matches!(fleet.get_system_info(id).await, Err(FleetError::NotFound(_))));
    assert!(matches!(
        fleet.edit_instance(id, &VpsPatch::default()).await,
        Err(FleetError::NotFound(_))
    ));
    assert!(!fleet.delete_instance(id).await);
}

#[tokio::test]
async fn edit_rejects_invalid_patch_without_mutation() {
    let fleet = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));
    let vps = instance("web", "192.0.2.70");
    let id = vps.id;
    fleet.restore(vec![vps.clone()]).await;

    let bad = VpsPatch {
        port: Some(0),
        ..VpsPatch::default()
    };
    assert!(matches!(
        fleet.edit_instance(id, &bad).await,
        Err(FleetError::InvalidConfiguration(_))
    ));
    assert_eq!(fleet.get_instance(id).await.unwrap().port, vps.port);

    let rename = VpsPatch {
        name: Some("web-renamed".to_string()),
        ..VpsPatch::default()
    };
    let edited = fleet.edit_instance(id, &rename).await.unwrap();
    assert_eq!(edited.name, "web-renamed");
    assert!(edited.updated_at >= vps.updated_at);
}

#[tokio::test]
async fn delete_does_not_cascade_to_configurations() {
    let fleet = coordinator(Arc::new(ScriptedProber::new()), Arc::new(FakeOpener::new()));
    let vps = instance("proxy", "192.0.2.80");
    let id = vps.id;
    fleet.restore(vec![vps]).await;
    fleet
        .add_service(id, VpsService::new("ss-main", ServiceType::Shadowsocks, "Shadowsocks"))
        .await
        .unwrap();

    let mut compiler = ConfigurationCompiler::default();
    let config_id = compiler
        .register(
            ClientConfiguration::new(id, ProtocolType::Shadowsocks, "192.0.2.80", 8388)
                .with_method("aes-256-gcm")
                .with_password("secret"),
        )
        .unwrap();

    assert!(fleet.delete_instance(id).await);
    assert!(!fleet.delete_instance(id).await);
    assert!(compiler.get(config_id).is_some());
    assert!(compiler.generate_protocol_url(config_id).is_ok());
}

#[tokio::test]
async fn initial_sweep_runs_once_for_fresh_process() {
    let prober = Arc::new(ScriptedProber::new());
    let fleet = coordinator(prober.clone(), Arc::new(FakeOpener::new()));
    fleet
        .restore(vec![instance("a", "192.0.2.90"), instance("b", "192.0.2.91")])
        .await;

    assert!(fleet.needs_initial_probe_sweep().await);
    let summary = fleet.run_initial_probe_sweep().await.unwrap();
    assert_eq!(summary.total, 2);
    assert!(fleet.run_initial_probe_sweep().await.is_none());
    assert_eq!(prober.total_calls(), 2);
}
