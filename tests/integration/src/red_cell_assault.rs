//! Red Cell Assault - Byzantine Attack Simulation
//!
//! Validates that adversarial peers are detected and isolated while honest
//! peers keep operating.
//!
//! # Test Scenarios
//!
//! 1. **Minority proposal**: a proposer pushes a value only a minority saw
//! 2. **Double spend with proof**: isolated on a single report
//! 3. **Weak report**: a lone message-delay report raises nothing
//! 4. **Coordinated attackers**: several liars across rounds, honest peers unaffected
//! 5. **Rehabilitation**: release plus honest interactions rebuild trust

use crate::test_utils::{ids, MeshHarness};
use palisade_byzantine::{ByzantineBehavior, Evidence, Severity, TrustLevel, NETWORK_ISOLATION};
use palisade_core::ExclusionSource;
use std::collections::HashMap;

fn votes(split: &[(&str, usize)]) -> HashMap<String, String> {
    let mut received = HashMap::new();
    let mut voter = 0;
    for (value, count) in split {
        for _ in 0..*count {
            received.insert(format!("voter-{}", voter), value.to_string());
            voter += 1;
        }
    }
    received
}

#[test]
fn test_minority_proposal_is_a_consensus_violation() {
    let harness = MeshHarness::new();
    let detector = harness.mesh.detector();
    harness.beacon_all(&["proposer", "voter-0", "voter-1"], 20.0);

    let received = votes(&[("value_a", 7), ("value_b", 2)]);
    let (valid, alert) = detector.validate_consensus(17, "proposer", "value_b", &received);

    assert!(!valid);
    let alert = alert.expect("violation should raise an alert");
    assert_eq!(alert.behavior_type, ByzantineBehavior::ConsensusViolation);
    assert!(matches!(alert.severity, Severity::High | Severity::Critical));
    assert_eq!(alert.consensus_round, Some(17));
    assert!(alert.isolation_applied);

    // Alive but unusable
    assert!(!harness.mesh.shield().is_excluded("proposer"));
    assert!(harness.mesh.is_excluded("proposer"));
    assert_eq!(harness.mesh.get_healthy_peers(), ids(&["voter-0", "voter-1"]));
}

#[test]
fn test_double_spend_with_direct_proof() {
    let harness = MeshHarness::new();
    let alert = harness
        .mesh
        .detector()
        .detect_byzantine_behavior(
            "spender",
            ByzantineBehavior::DoubleSpend,
            Evidence::new()
                .with_direct_proof()
                .with_detail("tx", "0xfeed"),
            None,
            None,
        )
        .unwrap();

    assert_eq!(alert.confidence, 0.8);
    assert_eq!(alert.severity, Severity::High);
    assert_eq!(alert.isolation_action.as_deref(), Some(NETWORK_ISOLATION));
    assert_eq!(alert.evidence.details["tx"], "0xfeed");
    assert!(harness.mesh.is_excluded("spender"));
}

#[test]
fn test_weak_report_is_ignored() {
    let harness = MeshHarness::new();
    let alert = harness.mesh.detector().detect_byzantine_behavior(
        "slowpoke",
        ByzantineBehavior::MessageDelay,
        Evidence::new(),
        None,
        None,
    );

    assert!(alert.is_none());
    assert!(!harness.mesh.is_excluded("slowpoke"));
    assert_eq!(harness.mesh.get_statistics(None, None).byzantine.total_alerts, 0);
}

#[test]
fn test_coordinated_attackers_across_rounds() {
    let harness = MeshHarness::new();
    let detector = harness.mesh.detector();
    let honest = ["h0", "h1", "h2", "h3", "h4"];
    let liars = ["liar-0", "liar-1", "liar-2"];
    harness.beacon_all(&honest, 15.0);
    harness.beacon_all(&liars, 15.0);

    let mut round = 0;
    for proposer in honest.iter().chain(liars.iter()) {
        round += 1;
        let proposed = if proposer.starts_with("liar") { "forged" } else { "honest" };
        let received = votes(&[("honest", honest.len()), ("forged", liars.len())]);

        let (valid, _) = detector.validate_consensus(round, proposer, proposed, &received);
        assert_eq!(valid, !proposer.starts_with("liar"), "round {}", round);
        harness.advance_ms(1_000);
    }

    assert_eq!(detector.isolated_peers(), ids(&liars));
    assert_eq!(harness.mesh.get_healthy_peers(), ids(&honest));
    for peer in honest {
        assert!(detector.get_node_reputation(peer).is_none());
    }

    let stats = harness.mesh.get_statistics(None, None);
    assert_eq!(stats.byzantine.total_alerts, 3);
    assert_eq!(
        stats.byzantine.by_behavior[&ByzantineBehavior::ConsensusViolation],
        3
    );
    assert_eq!(stats.byzantine.isolated_nodes, 3);

    // Another forged proposal from an isolated liar raises nothing new
    let received = votes(&[("honest", 5), ("forged", 3)]);
    let (valid, alert) = detector.validate_consensus(99, "liar-0", "forged", &received);
    assert!(!valid);
    assert!(alert.is_none());
    assert_eq!(detector.alerts().len(), 3);
}

#[test]
fn test_release_and_rehabilitation() {
    let harness = MeshHarness::new();
    let detector = harness.mesh.detector();
    harness.beacon_all(&["n1"], 15.0);

    detector
        .detect_byzantine_behavior(
            "n1",
            ByzantineBehavior::MaliciousAggregation,
            Evidence::new().with_multiple_witnesses(),
            Some("auditor"),
            None,
        )
        .unwrap();
    assert!(harness.mesh.is_excluded("n1"));

    assert!(detector.release_isolation("n1"));
    assert!(!harness.mesh.is_excluded("n1"));
    assert_eq!(
        detector.get_node_reputation("n1").unwrap().trust_level,
        TrustLevel::Banned
    );

    // One violation caps the score at 0.9 of the success ratio
    for _ in 0..29 {
        detector.record_interaction("n1", true);
    }
    let reputation = detector.get_node_reputation("n1").unwrap();
    assert_eq!(reputation.total_interactions, 30);
    assert!(reputation.reputation_score > 0.8);
    assert_eq!(reputation.trust_level, TrustLevel::Trusted);
}
