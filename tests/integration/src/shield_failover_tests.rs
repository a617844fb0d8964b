//! Shield Failover - liveness loss and recovery across the trust mesh
//!
//! # Test Scenarios
//!
//! 1. **Beacon loss**: a peer stops beaconing, is quarantined and routed around
//! 2. **Long outage**: quarantine expiry alone never restores a peer
//! 3. **Rolling outages**: each outage is counted exactly once in metrics

use crate::test_utils::{ids, MeshHarness};
use palisade_core::ExclusionSource;
use palisade_shield::{FailureCause, PeerStatus};

const BEACON_PERIOD_MS: u64 = 400;
const HEALTH_PERIOD_MS: u64 = 1_000;
const STEP_MS: u64 = 100;

/// Drive simulated time in small steps, firing beacons and health passes on
/// their own periods. `beaconing` decides per step which peers still beacon.
fn simulate(harness: &MeshHarness, duration_ms: u64, beaconing: impl Fn(u64) -> Vec<&'static str>) {
    let mut elapsed = 0;
    while elapsed < duration_ms {
        harness.advance_ms(STEP_MS);
        elapsed += STEP_MS;

        if elapsed % BEACON_PERIOD_MS == 0 {
            harness.beacon_all(&beaconing(elapsed), 25.0);
        }
        if elapsed % HEALTH_PERIOD_MS == 0 {
            harness.mesh.shield().run_health_check();
        }
    }
}

#[test]
fn test_beacon_loss_quarantines_and_reroutes() {
    let harness = MeshHarness::new();
    let shield = harness.mesh.shield();
    harness.beacon_all(&["n1", "n2", "n3"], 25.0);
    shield.set_route("gateway", ids(&["n1", "n2"]));
    shield.set_route("archive", ids(&["n3"]));

    // n1 beacons ten times at 400 ms, then falls silent; n2 and n3 keep going
    let n1_last_beacon = harness.now_ms() + 10 * BEACON_PERIOD_MS;
    simulate(&harness, 10_000, |elapsed| {
        if elapsed <= 10 * BEACON_PERIOD_MS {
            vec!["n1", "n2", "n3"]
        } else {
            vec!["n2", "n3"]
        }
    });

    let n1 = shield.get_peer("n1").unwrap();
    assert_eq!(n1.status, PeerStatus::Quarantined);
    assert_eq!(n1.failure_count, 1);
    assert_eq!(n1.last_beacon_ms, n1_last_beacon);

    let events = shield.failure_events();
    assert_eq!(events.len(), 1);
    let event = &events[0];
    assert_eq!(event.peer_id, "n1");
    assert_eq!(event.cause, FailureCause::BeaconTimeout);
    assert!(event.recovered);
    // Detected on the first health pass after 3 s of silence
    assert!(event.detection_time > 3.0 && event.detection_time <= 4.0);

    let detected_at_ms = (event.timestamp * 1000.0).round() as u64;
    assert_eq!(n1.quarantine_until_ms, detected_at_ms + 30_000);

    let gateway = shield.active_route("gateway").unwrap();
    assert!(!gateway.contains(&"n1".to_string()));
    assert_eq!(shield.active_route("archive").unwrap(), ids(&["n3"]));

    assert!(harness.mesh.is_excluded("n1"));
    assert_eq!(harness.mesh.get_healthy_peers(), ids(&["n2", "n3"]));
}

#[test]
fn test_outage_longer_than_quarantine() {
    let harness = MeshHarness::new();
    let shield = harness.mesh.shield();
    harness.beacon_all(&["n1", "n2"], 25.0);

    // Two minutes of silence from n1, four quarantine windows
    simulate(&harness, 120_000, |_| vec!["n2"]);

    let n1 = shield.get_peer("n1").unwrap();
    assert_eq!(n1.status, PeerStatus::Quarantined);
    assert!(!n1.is_quarantined(harness.now_ms()));
    assert_eq!(shield.failure_events().len(), 1);
    assert!(harness.mesh.is_excluded("n1"));

    // Only a beacon brings it back
    harness.mesh.on_peer_beacon("n1", 30.0);
    let n1 = shield.get_peer("n1").unwrap();
    assert_eq!(n1.status, PeerStatus::Healthy);
    assert_eq!(n1.recovery_count, 1);
    assert_eq!(n1.quarantine_until_ms, 0);
    assert!(!harness.mesh.is_excluded("n1"));
}

#[test]
fn test_rolling_outages_counted_once_each() {
    let harness = MeshHarness::new();
    let shield = harness.mesh.shield();
    harness.beacon_all(&["a", "b", "c"], 25.0);

    // a drops out first, then b; c stays up throughout
    simulate(&harness, 20_000, |elapsed| {
        if elapsed < 5_000 {
            vec!["a", "b", "c"]
        } else if elapsed < 10_000 {
            vec!["b", "c"]
        } else {
            vec!["c"]
        }
    });

    let metrics = shield.get_metrics();
    assert_eq!(metrics.failures_detected, 2);
    assert_eq!(metrics.failures_recovered, 2);
    assert_eq!(metrics.quarantines, 2);
    assert_eq!(metrics.recovery_rate, 1.0);
    assert_eq!(metrics.nodes_healthy, 1);
    assert!(metrics.mttd_avg > 3.0 && metrics.mttd_avg <= 4.0);

    let failed: Vec<String> = shield
        .failure_events()
        .into_iter()
        .map(|e| e.peer_id)
        .collect();
    assert_eq!(failed, ids(&["a", "b"]));
}
