//! Trust mesh end-to-end: configuration, scheduled passes and metric export

use crate::test_utils::{ids, init_tracing, MeshHarness};
use palisade_byzantine::{ByzantineBehavior, Evidence};
use palisade_core::{Config, ExclusionSource};
use palisade_trust_mesh::TrustMesh;
use std::time::Duration;

#[test]
fn test_toml_config_drives_thresholds() {
    let config = Config::from_toml_str(
        r#"
        [node]
        node_id = "relay-7"

        [shield]
        failure_threshold_ms = 6000
        degraded_threshold_ms = 2000

        [byzantine]
        reputation_threshold = 0.95
        "#,
    )
    .unwrap();
    let harness = MeshHarness::with_config(config);
    harness.mesh.on_peer_discovered("n1");

    harness.advance_ms(4_000);
    let summary = harness.mesh.shield().run_health_check();
    assert_eq!(summary.degraded, ids(&["n1"]));
    assert!(summary.failed.is_empty());

    harness.advance_ms(2_500);
    assert_eq!(harness.mesh.shield().run_health_check().failed, ids(&["n1"]));

    // With a high reputation threshold a lone delay report from a slightly
    // distrusted peer crosses the alert line
    let detector = harness.mesh.detector();
    for success in [true, true, true, true, false] {
        detector.record_interaction("n2", success);
    }
    let alert = detector.detect_byzantine_behavior(
        "n2",
        ByzantineBehavior::MessageDelay,
        Evidence::new(),
        None,
        None,
    );
    assert_eq!(alert.unwrap().confidence, 0.7);
}

#[test]
fn test_export_document() {
    let harness = MeshHarness::new();
    harness.beacon_all(&["n1", "n2", "n3"], 40.0);
    harness.advance_ms(4_000);
    harness.beacon_all(&["n2", "n3"], 40.0);
    harness.mesh.shield().run_health_check();
    harness
        .mesh
        .detector()
        .detect_byzantine_behavior(
            "n3",
            ByzantineBehavior::DoubleSpend,
            Evidence::new().with_direct_proof(),
            None,
            None,
        )
        .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mesh_shield_metrics.json");
    harness.mesh.export_metrics(&path).unwrap();

    let document: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(document["node_id"], "node-001");
    assert_eq!(document["metrics"]["failures_detected"], 1);
    assert_eq!(document["metrics"]["nodes_quarantined"], 1);
    assert_eq!(document["nodes"].as_array().unwrap().len(), 3);
    assert_eq!(document["nodes"][0]["peer_id"], "n1");
    assert_eq!(document["nodes"][0]["status"], "quarantined");
    assert_eq!(document["nodes"][0]["quarantined"], true);
    assert_eq!(document["failure_events"][0]["cause"], "beacon_timeout");

    // Isolation is not part of the shield export
    assert_eq!(document["nodes"][2]["status"], "healthy");
    assert!(harness.mesh.is_excluded("n3"));
}

#[tokio::test]
async fn test_scheduled_mesh_detects_silent_peer() {
    init_tracing();
    let config = Config::from_toml_str(
        r#"
        [shield]
        beacon_interval_ms = 20
        health_check_interval_ms = 20
        reputation_interval_ms = 20
        failure_threshold_ms = 300
        degraded_threshold_ms = 150
        "#,
    )
    .unwrap();
    let mesh = TrustMesh::new(&config);
    mesh.on_peer_discovered("silent");
    mesh.on_peer_discovered("chatty");

    let handles = mesh.start().unwrap();
    for _ in 0..30 {
        mesh.on_peer_beacon("chatty", 10.0);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    mesh.stop();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("pass should stop")
            .unwrap();
    }

    assert!(mesh.is_excluded("silent"));
    assert!(!mesh.is_excluded("chatty"));
    assert_eq!(mesh.shield().failure_events().len(), 1);
    assert_eq!(mesh.get_healthy_peers(), ids(&["chatty"]));
}
