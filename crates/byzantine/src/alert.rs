//! Byzantine alerts and the evidence behind them.

use palisade_core::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Isolation action recorded on alerts that removed a peer from the mesh
pub const NETWORK_ISOLATION: &str = "network_isolation";

/// Class of misbehavior being reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ByzantineBehavior {
    /// Contradictory state reported to different peers
    InconsistentState,
    DoubleSpend,
    LieAboutState,
    SelectiveMessageDrop,
    MessageDelay,
    /// Proposal disagrees with the honest majority
    ConsensusViolation,
    /// Poisoned or forged aggregate contribution
    MaliciousAggregation,
}

impl ByzantineBehavior {
    pub fn as_str(&self) -> &'static str {
        match self {
            ByzantineBehavior::InconsistentState => "inconsistent_state",
            ByzantineBehavior::DoubleSpend => "double_spend",
            ByzantineBehavior::LieAboutState => "lie_about_state",
            ByzantineBehavior::SelectiveMessageDrop => "selective_message_drop",
            ByzantineBehavior::MessageDelay => "message_delay",
            ByzantineBehavior::ConsensusViolation => "consensus_violation",
            ByzantineBehavior::MaliciousAggregation => "malicious_aggregation",
        }
    }

    /// Behaviors that directly threaten safety rather than liveness
    pub fn is_critical(&self) -> bool {
        match self {
            ByzantineBehavior::DoubleSpend
            | ByzantineBehavior::ConsensusViolation
            | ByzantineBehavior::MaliciousAggregation => true,
            ByzantineBehavior::InconsistentState
            | ByzantineBehavior::LieAboutState
            | ByzantineBehavior::SelectiveMessageDrop
            | ByzantineBehavior::MessageDelay => false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    /// High and critical alerts isolate the peer
    pub fn requires_isolation(&self) -> bool {
        match self {
            Severity::High | Severity::Critical => true,
            Severity::Low | Severity::Medium => false,
        }
    }
}

/// Evidence submitted with a report.
///
/// Only the two flags influence confidence; `details` is carried verbatim
/// into the alert for operators.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    #[serde(default)]
    pub direct_proof: bool,
    #[serde(default)]
    pub multiple_witnesses: bool,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub details: Map<String, Value>,
}

impl Evidence {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_direct_proof(mut self) -> Self {
        self.direct_proof = true;
        self
    }

    pub fn with_multiple_witnesses(mut self) -> Self {
        self.multiple_witnesses = true;
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Record of detected Byzantine behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ByzantineAlert {
    pub alert_id: String,
    pub peer_id: PeerId,
    pub behavior_type: ByzantineBehavior,
    pub severity: Severity,
    /// 0.0 to 1.0
    pub confidence: f64,
    /// Detection instant (Unix epoch milliseconds)
    pub timestamp_ms: u64,
    pub consensus_round: Option<u64>,
    /// Reporters corroborating this alert
    pub reported_by: BTreeSet<PeerId>,
    pub evidence: Evidence,
    pub isolation_applied: bool,
    pub isolation_action: Option<String>,
}

/// Derive a stable alert identifier from its content.
///
/// `sequence` keeps identifiers unique when the same peer is reported twice
/// within one millisecond.
pub fn alert_id(
    peer_id: &str,
    behavior: ByzantineBehavior,
    timestamp_ms: u64,
    sequence: u64,
) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(peer_id.as_bytes());
    hasher.update(behavior.as_str().as_bytes());
    hasher.update(&timestamp_ms.to_le_bytes());
    hasher.update(&sequence.to_le_bytes());
    let digest = hasher.finalize();

    format!("byz-{}-{}", peer_id, hex::encode(&digest.as_bytes()[..8]))
}
