//! Byzantine Detector
//!
//! Scores reports of misbehavior, raises alerts once confidence is high
//! enough and isolates peers whose alerts are severe.
//!
//! # Confidence
//!
//! Confidence is accumulated in whole tenths and capped at ten, so threshold
//! comparisons (`>= 0.6`, `> 0.8`) are exact:
//!
//! | Signal                                   | Tenths |
//! |------------------------------------------|--------|
//! | Base                                     | 5      |
//! | Suspect score below `reputation_threshold` | +2   |
//! | Critical behavior class                  | +2     |
//! | Direct proof                             | +1     |
//! | Multiple witnesses                       | +1     |
//! | Reporter score above 0.8                 | +1     |
//! | Corroborated within the window           | +3     |
//!
//! Severity is fixed before corroboration is applied.
//!
//! Isolation is indefinite. Only [`ByzantineDetector::release_isolation`]
//! lifts it, and it never resets reputation.

use crate::alert::{
    alert_id, ByzantineAlert, ByzantineBehavior, Evidence, Severity, NETWORK_ISOLATION,
};
use crate::reputation::NodeReputation;
use crate::stats::{DetectorStatistics, StatisticsPeriod};
use palisade_core::{Clock, DetectorConfig, ExclusionSource, MutexExt, PeerId, SystemClock};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

const BASE_CONFIDENCE: u8 = 5;
const ALERT_THRESHOLD: u8 = 6;
const MAX_CONFIDENCE: u8 = 10;
const LOW_REPUTATION_BOOST: u8 = 2;
const CRITICAL_BEHAVIOR_BOOST: u8 = 2;
const CORROBORATION_BOOST: u8 = 3;

/// One validated consensus round
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    pub round: u64,
    pub proposer: PeerId,
    pub proposed_value: String,
    pub received_values: BTreeMap<PeerId, String>,
    pub timestamp_ms: u64,
}

#[derive(Debug, Default)]
struct DetectorState {
    reputations: HashMap<PeerId, NodeReputation>,
    alerts: Vec<ByzantineAlert>,
    isolated: BTreeSet<PeerId>,
    consensus_history: HashMap<u64, ConsensusRecord>,
    alert_sequence: u64,
}

/// Byzantine behavior detector and isolation authority
pub struct ByzantineDetector {
    config: DetectorConfig,
    clock: Arc<dyn Clock>,
    state: Mutex<DetectorState>,
}

impl ByzantineDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: DetectorConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            state: Mutex::new(DetectorState::default()),
        }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Evaluate a report of Byzantine behavior.
    ///
    /// # Arguments
    /// * `peer_id` - The suspect
    /// * `behavior` - The class of misbehavior
    /// * `evidence` - Flags and operator details supporting the report
    /// * `reported_by` - The reporting peer, if known
    /// * `consensus_round` - Round the behavior was observed in, if any
    ///
    /// # Returns
    /// * `Some(alert)` - Confidence reached 0.6; the alert has been logged
    /// * `None` - The suspect is already isolated or the evidence is insufficient
    pub fn detect_byzantine_behavior(
        &self,
        peer_id: &str,
        behavior: ByzantineBehavior,
        evidence: Evidence,
        reported_by: Option<&str>,
        consensus_round: Option<u64>,
    ) -> Option<ByzantineAlert> {
        let mut state = self.state.lock_or_recover();
        let now = self.clock.now_ms();
        self.detect_locked(
            &mut state,
            now,
            peer_id,
            behavior,
            evidence,
            reported_by,
            consensus_round,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn detect_locked(
        &self,
        state: &mut DetectorState,
        now: u64,
        peer_id: &str,
        behavior: ByzantineBehavior,
        evidence: Evidence,
        reported_by: Option<&str>,
        consensus_round: Option<u64>,
    ) -> Option<ByzantineAlert> {
        if state.isolated.contains(peer_id) {
            debug!(peer_id, behavior = behavior.as_str(), "Report ignored, peer already isolated");
            return None;
        }

        let suspect_score = state
            .reputations
            .entry(peer_id.to_string())
            .or_insert_with(|| NodeReputation::new(peer_id, now))
            .reputation_score;
        let trusted_reporter = reported_by
            .and_then(|reporter| state.reputations.get(reporter))
            .map_or(false, NodeReputation::is_trusted_reporter);

        let mut tenths =
            self.confidence_tenths(suspect_score, behavior, &evidence, trusted_reporter);
        if tenths < ALERT_THRESHOLD {
            debug!(
                peer_id,
                behavior = behavior.as_str(),
                confidence = confidence(tenths),
                "Insufficient evidence for Byzantine alert"
            );
            return None;
        }

        let severity = severity_for(behavior, tenths);

        let mut reporters = BTreeSet::new();
        if let Some(reporter) = reported_by {
            reporters.insert(reporter.to_string());

            let window_start = now.saturating_sub(self.config.corroboration_window_ms);
            let prior: Vec<&ByzantineAlert> = state
                .alerts
                .iter()
                .filter(|a| a.peer_id == peer_id && a.behavior_type == behavior)
                .filter(|a| a.timestamp_ms >= window_start)
                .collect();

            if prior.len() >= self.config.min_evidence_nodes.saturating_sub(1) {
                tenths = (tenths + CORROBORATION_BOOST).min(MAX_CONFIDENCE);
                for alert in &prior {
                    reporters.extend(alert.reported_by.iter().cloned());
                }
                debug!(peer_id, corroborating = prior.len(), "Report corroborated");
            }
        }

        state.alert_sequence += 1;
        let mut alert = ByzantineAlert {
            alert_id: alert_id(peer_id, behavior, now, state.alert_sequence),
            peer_id: peer_id.to_string(),
            behavior_type: behavior,
            severity,
            confidence: confidence(tenths),
            timestamp_ms: now,
            consensus_round,
            reported_by: reporters,
            evidence,
            isolation_applied: false,
            isolation_action: None,
        };

        if let Some(reputation) = state.reputations.get_mut(peer_id) {
            reputation.record_violation(now);
            reputation.update_reputation(false, now);
        }

        warn!(
            peer_id,
            alert_id = %alert.alert_id,
            behavior = behavior.as_str(),
            severity = severity.as_str(),
            confidence = alert.confidence,
            "Byzantine behavior detected"
        );

        if severity.requires_isolation() && state.isolated.insert(peer_id.to_string()) {
            alert.isolation_applied = true;
            alert.isolation_action = Some(NETWORK_ISOLATION.to_string());
            warn!(peer_id, alert_id = %alert.alert_id, "Peer isolated from the network");
        }

        state.alerts.push(alert.clone());
        Some(alert)
    }

    fn confidence_tenths(
        &self,
        suspect_score: f64,
        behavior: ByzantineBehavior,
        evidence: &Evidence,
        trusted_reporter: bool,
    ) -> u8 {
        let mut tenths = BASE_CONFIDENCE;
        if suspect_score < self.config.reputation_threshold {
            tenths += LOW_REPUTATION_BOOST;
        }
        if behavior.is_critical() {
            tenths += CRITICAL_BEHAVIOR_BOOST;
        }
        if evidence.direct_proof {
            tenths += 1;
        }
        if evidence.multiple_witnesses {
            tenths += 1;
        }
        if trusted_reporter {
            tenths += 1;
        }
        tenths.min(MAX_CONFIDENCE)
    }

    /// Check a proposer's value against what the other participants received.
    ///
    /// The round is always recorded. When received values disagree and the
    /// proposal is not among the most common values, a consensus violation is
    /// reported against the proposer.
    pub fn validate_consensus(
        &self,
        round: u64,
        proposer: &str,
        proposed_value: &str,
        received_values: &HashMap<PeerId, String>,
    ) -> (bool, Option<ByzantineAlert>) {
        let mut state = self.state.lock_or_recover();
        let now = self.clock.now_ms();

        state.consensus_history.insert(
            round,
            ConsensusRecord {
                round,
                proposer: proposer.to_string(),
                proposed_value: proposed_value.to_string(),
                received_values: received_values
                    .iter()
                    .map(|(peer, value)| (peer.clone(), value.clone()))
                    .collect(),
                timestamp_ms: now,
            },
        );

        let mut distribution: BTreeMap<&str, usize> = BTreeMap::new();
        for value in received_values.values() {
            *distribution.entry(value.as_str()).or_insert(0) += 1;
        }
        if distribution.len() <= 1 {
            return (true, None);
        }

        let top = distribution.values().copied().max().unwrap_or(0);
        if distribution.get(proposed_value).copied().unwrap_or(0) == top {
            return (true, None);
        }

        // Smallest value among the most common ones
        let majority = distribution
            .iter()
            .find(|(_, count)| **count == top)
            .map(|(value, _)| value.to_string())
            .unwrap_or_default();

        info!(
            round,
            proposer,
            proposed = proposed_value,
            majority = %majority,
            "Proposal disagrees with majority"
        );

        let evidence = Evidence::new()
            .with_detail("proposed", proposed_value)
            .with_detail("majority", majority)
            .with_detail(
                "distribution",
                serde_json::to_value(&distribution).unwrap_or_default(),
            );

        let alert = self.detect_locked(
            &mut state,
            now,
            proposer,
            ByzantineBehavior::ConsensusViolation,
            evidence,
            None,
            Some(round),
        );
        (false, alert)
    }

    /// Lift isolation. Returns false if the peer was not isolated.
    pub fn release_isolation(&self, peer_id: &str) -> bool {
        let released = self.state.lock_or_recover().isolated.remove(peer_id);
        if released {
            info!(peer_id, "Released peer from isolation");
        }
        released
    }

    /// Feed an honest-protocol interaction outcome, creating the record if needed
    pub fn record_interaction(&self, peer_id: &str, success: bool) {
        let mut state = self.state.lock_or_recover();
        let now = self.clock.now_ms();
        let reputation = state
            .reputations
            .entry(peer_id.to_string())
            .or_insert_with(|| NodeReputation::new(peer_id, now));
        reputation.update_reputation(success, now);
        debug!(
            peer_id,
            success,
            score = reputation.reputation_score,
            "Recorded interaction"
        );
    }

    /// Alert counts within `[start_ms, end_ms]`; missing bounds are open
    pub fn get_statistics(&self, start_ms: Option<u64>, end_ms: Option<u64>) -> DetectorStatistics {
        let state = self.state.lock_or_recover();
        DetectorStatistics::collect(
            state.alerts.iter(),
            state.reputations.values(),
            state.isolated.len(),
            StatisticsPeriod { start_ms, end_ms },
        )
    }

    pub fn get_node_reputation(&self, peer_id: &str) -> Option<NodeReputation> {
        self.state.lock_or_recover().reputations.get(peer_id).cloned()
    }

    pub fn is_isolated(&self, peer_id: &str) -> bool {
        self.state.lock_or_recover().isolated.contains(peer_id)
    }

    /// Isolated peers, sorted
    pub fn isolated_peers(&self) -> Vec<PeerId> {
        self.state.lock_or_recover().isolated.iter().cloned().collect()
    }

    pub fn alerts(&self) -> Vec<ByzantineAlert> {
        self.state.lock_or_recover().alerts.clone()
    }

    pub fn consensus_record(&self, round: u64) -> Option<ConsensusRecord> {
        self.state.lock_or_recover().consensus_history.get(&round).cloned()
    }
}

impl ExclusionSource for ByzantineDetector {
    fn is_excluded(&self, peer_id: &str) -> bool {
        self.is_isolated(peer_id)
    }
}

fn confidence(tenths: u8) -> f64 {
    f64::from(tenths) / 10.0
}

fn severity_for(behavior: ByzantineBehavior, tenths: u8) -> Severity {
    if behavior.is_critical() && tenths > 8 {
        Severity::Critical
    } else if behavior.is_critical() || tenths > 7 {
        Severity::High
    } else if tenths > 6 {
        Severity::Medium
    } else {
        Severity::Low
    }
}
