//! Failure log and recovery metrics (MTTD / MTTR).
//!
//! The export document is consumed by downstream analytics; its field names
//! are part of the interface.

use crate::peer::{NodeStatusEntry, PeerHealthTable, PeerStatus};
use palisade_core::PeerId;
use serde::{Deserialize, Serialize};

/// Number of failure events carried in an export
pub const EXPORTED_FAILURE_EVENTS: usize = 100;

/// Why an outage was declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCause {
    /// No beacon within the failure threshold
    BeaconTimeout,
}

/// Record of a detected outage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureEvent {
    pub peer_id: PeerId,
    /// Detection instant (Unix epoch seconds)
    pub timestamp: f64,
    /// Seconds from the last good beacon to detection
    pub detection_time: f64,
    /// Seconds from detection to restored routing
    pub recovery_time: f64,
    pub cause: FailureCause,
    pub recovered: bool,
}

/// Raw counters and samples accumulated by the shield
#[derive(Debug, Clone, Default)]
pub struct RecoveryCounters {
    pub mttr_samples: Vec<f64>,
    pub mttd_samples: Vec<f64>,
    pub failures_detected: u64,
    pub failures_recovered: u64,
    pub quarantines: u64,
}

impl RecoveryCounters {
    pub fn record_detection(&mut self, detection_time: f64) {
        self.failures_detected += 1;
        self.mttd_samples.push(detection_time);
    }

    pub fn record_recovery(&mut self, recovery_time: f64) {
        self.failures_recovered += 1;
        self.mttr_samples.push(recovery_time);
    }

    pub fn record_quarantine(&mut self) {
        self.quarantines += 1;
    }

    /// Combine counters with the current peer table into a snapshot
    pub fn snapshot(&self, peers: &PeerHealthTable, now_ms: u64) -> ShieldMetrics {
        ShieldMetrics {
            mttr_avg: mean(&self.mttr_samples),
            mttr_p95: p95(&self.mttr_samples),
            mttd_avg: mean(&self.mttd_samples),
            failures_detected: self.failures_detected,
            failures_recovered: self.failures_recovered,
            recovery_rate: self.failures_recovered as f64
                / self.failures_detected.max(1) as f64,
            quarantines: self.quarantines,
            nodes_healthy: peers.count_status(PeerStatus::Healthy),
            nodes_degraded: peers.count_status(PeerStatus::Degraded),
            nodes_quarantined: peers.iter().filter(|p| p.is_quarantined(now_ms)).count(),
            nodes_dead: peers.count_status(PeerStatus::Dead),
        }
    }
}

/// Snapshot returned by `get_metrics`.
///
/// The node buckets need not sum to the peer count. A peer whose quarantine
/// window has expired keeps `Quarantined` status until its next beacon and
/// is counted in none of them. `Dead` only exists inside failure handling,
/// so `nodes_dead` reads zero outside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShieldMetrics {
    /// Mean recovery time in seconds
    pub mttr_avg: f64,
    /// 95th percentile recovery time in seconds (zero below two samples)
    pub mttr_p95: f64,
    /// Mean detection time in seconds
    pub mttd_avg: f64,
    pub failures_detected: u64,
    pub failures_recovered: u64,
    pub recovery_rate: f64,
    pub quarantines: u64,
    pub nodes_healthy: usize,
    pub nodes_degraded: usize,
    /// Peers inside an active quarantine window
    pub nodes_quarantined: usize,
    pub nodes_dead: usize,
}

/// Document written by `export_metrics`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsExport {
    /// Export instant (Unix epoch seconds)
    pub timestamp: f64,
    pub node_id: String,
    pub metrics: ShieldMetrics,
    pub nodes: Vec<NodeStatusEntry>,
    /// Most recent events, oldest first
    pub failure_events: Vec<FailureEvent>,
}

fn mean(samples: &[f64]) -> f64 {
    if samples.is_empty() {
        return 0.0;
    }
    samples.iter().sum::<f64>() / samples.len() as f64
}

fn p95(samples: &[f64]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = ((sorted.len() as f64) * 0.95) as usize;
    sorted[index.min(sorted.len() - 1)]
}
