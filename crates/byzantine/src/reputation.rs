//! Node Reputation
//!
//! Interaction-based trust kept by the Byzantine detector. Scores are
//! derived from the success ratio and decay exponentially with each recorded
//! violation.

use palisade_core::PeerId;
use serde::{Deserialize, Serialize};

/// Score above which a reporter's word adds confidence
pub const TRUSTED_REPORTER_SCORE: f64 = 0.8;

/// Per-violation decay applied to the success ratio
pub const VIOLATION_DECAY: f64 = 0.9;

/// Trust classification derived from a reputation score
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrustLevel {
    Trusted,     // score >= 0.8
    Suspicious,  // score >= 0.5
    Untrusted,   // score >= 0.2
    Banned,      // score < 0.2
}

impl TrustLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            TrustLevel::Trusted
        } else if score >= 0.5 {
            TrustLevel::Suspicious
        } else if score >= 0.2 {
            TrustLevel::Untrusted
        } else {
            TrustLevel::Banned
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TrustLevel::Trusted => "trusted",
            TrustLevel::Suspicious => "suspicious",
            TrustLevel::Untrusted => "untrusted",
            TrustLevel::Banned => "banned",
        }
    }
}

/// Reputation record for a peer, created on first evidence and never deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeReputation {
    pub peer_id: PeerId,
    /// 0.0 to 1.0
    pub reputation_score: f64,
    pub total_interactions: u64,
    pub successful_interactions: u64,
    pub byzantine_violations: u32,
    /// Most recent violation (Unix epoch milliseconds)
    pub last_violation_ms: Option<u64>,
    /// Most recent score update (Unix epoch milliseconds)
    pub last_updated_ms: u64,
    pub trust_level: TrustLevel,
}

impl NodeReputation {
    pub fn new(peer_id: impl Into<PeerId>, now_ms: u64) -> Self {
        Self {
            peer_id: peer_id.into(),
            reputation_score: 1.0,
            total_interactions: 0,
            successful_interactions: 0,
            byzantine_violations: 0,
            last_violation_ms: None,
            last_updated_ms: now_ms,
            trust_level: TrustLevel::Trusted,
        }
    }

    /// Record one interaction and recompute the score.
    ///
    /// `score = (successful / total) × 0.9^violations`
    pub fn update_reputation(&mut self, success: bool, now_ms: u64) {
        self.total_interactions += 1;
        if success {
            self.successful_interactions += 1;
        }

        let ratio = self.successful_interactions as f64 / self.total_interactions as f64;
        let decay = VIOLATION_DECAY.powi(self.byzantine_violations as i32);
        self.set_score(ratio * decay);
        self.last_updated_ms = now_ms;
    }

    /// Count a violation without touching the interaction tally
    pub fn record_violation(&mut self, now_ms: u64) {
        self.byzantine_violations += 1;
        self.last_violation_ms = Some(now_ms);
    }

    /// Replace the score, keeping it in [0, 1] and the trust level in sync.
    /// NaN is stored as zero.
    pub fn set_score(&mut self, score: f64) {
        self.reputation_score = if score.is_nan() { 0.0 } else { score.clamp(0.0, 1.0) };
        self.trust_level = TrustLevel::from_score(self.reputation_score);
    }

    pub fn is_trusted_reporter(&self) -> bool {
        self.reputation_score > TRUSTED_REPORTER_SCORE
    }
}
