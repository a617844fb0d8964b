//! Route table and next-hop ranking used for rerouting around failed peers.
//!
//! Only already-known candidates are ranked; topology is computed elsewhere.

use crate::peer::{PeerHealth, PeerHealthTable};
use palisade_core::PeerId;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Number of peers in a freshly ranked path
pub const RANKED_PATH_LEN: usize = 2;

/// What happened to an active route that went through a failed peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RerouteOutcome {
    /// Switched to the precomputed backup path
    Backup(Vec<PeerId>),
    /// No usable backup; replaced with a ranked path
    Recomputed(Vec<PeerId>),
    /// No usable backup and no routable candidates; route removed
    Dropped,
}

/// Active and backup paths keyed by destination
#[derive(Debug, Default)]
pub struct RouteTable {
    active: HashMap<String, Vec<PeerId>>,
    backup: HashMap<String, Vec<PeerId>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_route(&mut self, destination: String, path: Vec<PeerId>) {
        self.active.insert(destination, path);
    }

    pub fn set_backup_route(&mut self, destination: String, path: Vec<PeerId>) {
        self.backup.insert(destination, path);
    }

    pub fn active_route(&self, destination: &str) -> Option<&Vec<PeerId>> {
        self.active.get(destination)
    }

    pub fn active_routes(&self) -> &HashMap<String, Vec<PeerId>> {
        &self.active
    }

    /// Destinations whose active path goes through `peer_id`, sorted
    pub fn routes_through(&self, peer_id: &str) -> Vec<String> {
        let mut destinations: Vec<String> = self
            .active
            .iter()
            .filter(|(_, path)| path.iter().any(|hop| hop == peer_id))
            .map(|(destination, _)| destination.clone())
            .collect();
        destinations.sort();
        destinations
    }

    /// Move every active route off `failed_peer`.
    ///
    /// A backup path is preferred when it avoids the failed peer; otherwise a
    /// path is ranked from the routable peers in `peers`.
    pub fn reroute(
        &mut self,
        failed_peer: &str,
        peers: &PeerHealthTable,
        now_ms: u64,
    ) -> Vec<(String, RerouteOutcome)> {
        let mut outcomes = Vec::new();

        for destination in self.routes_through(failed_peer) {
            let usable_backup = self
                .backup
                .get(&destination)
                .filter(|path| !path.iter().any(|hop| hop == failed_peer))
                .cloned();

            let outcome = match usable_backup {
                Some(path) => {
                    self.active.insert(destination.clone(), path.clone());
                    RerouteOutcome::Backup(path)
                }
                None => {
                    let path = rank_next_hops(peers.iter(), &[failed_peer], now_ms);
                    if path.is_empty() {
                        self.active.remove(&destination);
                        RerouteOutcome::Dropped
                    } else {
                        self.active.insert(destination.clone(), path.clone());
                        RerouteOutcome::Recomputed(path)
                    }
                }
            };

            outcomes.push((destination, outcome));
        }

        outcomes
    }
}

/// Rank routable peers by `reputation / max(latency_ms, 1)` descending and
/// keep the best [`RANKED_PATH_LEN`]. Ties are broken by peer ID. A weight
/// that is not finite ranks below every real weight.
pub fn rank_next_hops<'a>(
    candidates: impl Iterator<Item = &'a PeerHealth>,
    exclude: &[&str],
    now_ms: u64,
) -> Vec<PeerId> {
    let mut ranked: Vec<&PeerHealth> = candidates
        .filter(|peer| peer.is_routable(now_ms))
        .filter(|peer| !exclude.contains(&peer.peer_id.as_str()))
        .collect();

    ranked.sort_by(|a, b| match ranking_weight(b).total_cmp(&ranking_weight(a)) {
        Ordering::Equal => a.peer_id.cmp(&b.peer_id),
        other => other,
    });

    ranked
        .into_iter()
        .take(RANKED_PATH_LEN)
        .map(|peer| peer.peer_id.clone())
        .collect()
}

fn ranking_weight(peer: &PeerHealth) -> f64 {
    let weight = peer.routing_weight();
    if weight.is_finite() {
        weight
    } else {
        f64::NEG_INFINITY
    }
}
