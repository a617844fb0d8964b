//! Peer Health Table
//!
//! One liveness record per known peer. The table is plain data; the shield
//! decides when records change state.

use palisade_core::PeerId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Liveness state of a peer.
///
/// `Healthy ⇄ Degraded → Dead → Quarantined → Healthy`. Quarantine is only
/// entered through `Dead` and only left through a fresh beacon.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerStatus {
    /// Beacons arrive on time with acceptable latency
    Healthy,
    /// Beacons are late or latency is high, still routable for existing paths
    Degraded,
    /// Excluded from routing after a detected failure
    Quarantined,
    /// Failure detected, quarantine pending
    Dead,
}

impl PeerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PeerStatus::Healthy => "healthy",
            PeerStatus::Degraded => "degraded",
            PeerStatus::Quarantined => "quarantined",
            PeerStatus::Dead => "dead",
        }
    }

    /// Whether this status alone excludes the peer from routing and consensus
    pub fn is_unusable(&self) -> bool {
        match self {
            PeerStatus::Quarantined | PeerStatus::Dead => true,
            PeerStatus::Healthy | PeerStatus::Degraded => false,
        }
    }
}

/// Liveness record for a mesh peer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeerHealth {
    /// Unique peer identifier
    pub peer_id: PeerId,
    /// Current liveness status
    pub status: PeerStatus,
    /// Most recent beacon (Unix epoch milliseconds)
    pub last_beacon_ms: u64,
    /// Latency reported by the most recent beacon
    pub latency_ms: f64,
    /// Most recent observed packet loss ratio (0.0 to 1.0)
    pub packet_loss: f64,
    /// Reputation (0.0 to 1.0)
    pub reputation: f64,
    /// Detected outages
    pub failure_count: u64,
    /// Completed recoveries
    pub recovery_count: u64,
    /// Quarantine deadline (Unix epoch milliseconds), zero when not quarantined
    pub quarantine_until_ms: u64,
}

impl PeerHealth {
    pub fn new(peer_id: PeerId, now_ms: u64) -> Self {
        Self {
            peer_id,
            status: PeerStatus::Healthy,
            last_beacon_ms: now_ms,
            latency_ms: 0.0,
            packet_loss: 0.0,
            reputation: 1.0,
            failure_count: 0,
            recovery_count: 0,
            quarantine_until_ms: 0,
        }
    }

    /// Milliseconds since the last beacon
    pub fn silence_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.last_beacon_ms)
    }

    /// Check if the peer beaconed within `timeout_ms`
    pub fn is_alive(&self, now_ms: u64, timeout_ms: u64) -> bool {
        self.silence_ms(now_ms) < timeout_ms
    }

    /// Quarantine is time-boxed; this says nothing about whether the peer recovered
    pub fn is_quarantined(&self, now_ms: u64) -> bool {
        now_ms < self.quarantine_until_ms
    }

    /// Multiply reputation by `factor`, keeping it in [0, 1]
    pub fn scale_reputation(&mut self, factor: f64) {
        self.reputation = (self.reputation * factor).clamp(0.0, 1.0);
    }

    /// Ranking weight for next-hop selection: reputation per millisecond of latency
    pub fn routing_weight(&self) -> f64 {
        self.reputation / self.latency_ms.max(1.0)
    }

    /// Available for new routes
    pub fn is_routable(&self, now_ms: u64) -> bool {
        self.status == PeerStatus::Healthy && !self.is_quarantined(now_ms)
    }

    pub fn status_entry(&self, now_ms: u64) -> NodeStatusEntry {
        NodeStatusEntry {
            peer_id: self.peer_id.clone(),
            status: self.status,
            latency_ms: round_to(self.latency_ms, 2),
            reputation: round_to(self.reputation, 3),
            failures: self.failure_count,
            recoveries: self.recovery_count,
            quarantined: self.is_quarantined(now_ms),
        }
    }
}

/// Per-peer row of `get_node_status`, also embedded in metric exports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeStatusEntry {
    pub peer_id: PeerId,
    pub status: PeerStatus,
    pub latency_ms: f64,
    pub reputation: f64,
    pub failures: u64,
    pub recoveries: u64,
    pub quarantined: bool,
}

/// Liveness records indexed by peer ID
#[derive(Debug, Default)]
pub struct PeerHealthTable {
    peers: HashMap<PeerId, PeerHealth>,
}

impl PeerHealthTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh record if the peer is unknown. Returns true when inserted.
    pub fn register(&mut self, peer_id: &str, now_ms: u64) -> bool {
        if self.peers.contains_key(peer_id) {
            return false;
        }
        self.peers
            .insert(peer_id.to_string(), PeerHealth::new(peer_id.to_string(), now_ms));
        true
    }

    pub fn get(&self, peer_id: &str) -> Option<&PeerHealth> {
        self.peers.get(peer_id)
    }

    pub fn get_mut(&mut self, peer_id: &str) -> Option<&mut PeerHealth> {
        self.peers.get_mut(peer_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &PeerHealth> {
        self.peers.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PeerHealth> {
        self.peers.values_mut()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }

    pub fn count_status(&self, status: PeerStatus) -> usize {
        self.peers.values().filter(|p| p.status == status).count()
    }

    /// Peers with `Healthy` status that are not quarantined, sorted by ID
    pub fn healthy_peers(&self, now_ms: u64) -> Vec<PeerId> {
        let mut ids: Vec<PeerId> = self
            .peers
            .values()
            .filter(|p| p.is_routable(now_ms))
            .map(|p| p.peer_id.clone())
            .collect();
        ids.sort();
        ids
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
