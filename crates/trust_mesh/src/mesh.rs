//! Trust Mesh Facade
//!
//! Answers "may I use this peer?" by consulting both the shield's liveness
//! view and the detector's isolation set. The two are never merged; every
//! query here checks each of them.

use palisade_byzantine::{ByzantineDetector, DetectorStatistics};
use palisade_core::{Clock, Config, ExclusionSource, PeerId, SystemClock};
use palisade_shield::{MeshShield, NodeStatusEntry, ShieldMetrics, ShieldResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::debug;

/// Per-peer row combining liveness status with Byzantine isolation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustNodeStatus {
    #[serde(flatten)]
    pub health: NodeStatusEntry,
    pub isolated: bool,
}

impl TrustNodeStatus {
    /// Neither liveness nor isolation excludes this peer
    pub fn is_usable(&self) -> bool {
        !self.health.status.is_unusable() && !self.isolated
    }
}

/// Combined view of both subsystems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustStatistics {
    pub shield: ShieldMetrics,
    pub byzantine: DetectorStatistics,
}

/// Facade over the shield and the Byzantine detector
pub struct TrustMesh {
    shield: Arc<MeshShield>,
    detector: Arc<ByzantineDetector>,
}

impl TrustMesh {
    /// Build both subsystems from configuration using the system clock
    pub fn new(config: &Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build both subsystems sharing one clock
    pub fn with_clock(config: &Config, clock: Arc<dyn Clock>) -> Self {
        let shield = MeshShield::with_clock(
            config.node.node_id.clone(),
            config.shield.clone(),
            Arc::clone(&clock),
        );
        let detector = ByzantineDetector::with_clock(config.byzantine.clone(), clock);
        Self::from_parts(Arc::new(shield), Arc::new(detector))
    }

    pub fn from_parts(shield: Arc<MeshShield>, detector: Arc<ByzantineDetector>) -> Self {
        Self { shield, detector }
    }

    pub fn shield(&self) -> &Arc<MeshShield> {
        &self.shield
    }

    pub fn detector(&self) -> &Arc<ByzantineDetector> {
        &self.detector
    }

    pub fn start(&self) -> ShieldResult<Vec<JoinHandle<()>>> {
        self.shield.start()
    }

    pub fn stop(&self) {
        self.shield.stop();
    }

    /// Transport discovered a new peer
    pub fn on_peer_discovered(&self, peer_id: &str) {
        self.shield.register_node(peer_id);
    }

    /// Transport received a beacon
    pub fn on_peer_beacon(&self, peer_id: &str, latency_ms: f64) {
        self.shield.receive_beacon(peer_id, latency_ms);
    }

    /// Shield-healthy peers that are not isolated, sorted by ID
    pub fn get_healthy_peers(&self) -> Vec<PeerId> {
        let healthy = self.shield.get_healthy_peers();
        let total = healthy.len();
        let usable: Vec<PeerId> = healthy
            .into_iter()
            .filter(|peer_id| !self.detector.is_isolated(peer_id))
            .collect();

        if usable.len() != total {
            debug!(
                healthy = total,
                usable = usable.len(),
                "Isolated peers removed from healthy set"
            );
        }
        usable
    }

    pub fn get_node_status(&self) -> Vec<TrustNodeStatus> {
        self.shield
            .get_node_status()
            .into_iter()
            .map(|health| {
                let isolated = self.detector.is_isolated(&health.peer_id);
                TrustNodeStatus { health, isolated }
            })
            .collect()
    }

    /// Shield metrics plus detector statistics for `[start_ms, end_ms]`
    pub fn get_statistics(&self, start_ms: Option<u64>, end_ms: Option<u64>) -> TrustStatistics {
        TrustStatistics {
            shield: self.shield.get_metrics(),
            byzantine: self.detector.get_statistics(start_ms, end_ms),
        }
    }

    pub fn export_metrics(&self, path: impl AsRef<Path>) -> ShieldResult<()> {
        self.shield.export_metrics(path)
    }
}

impl ExclusionSource for TrustMesh {
    fn is_excluded(&self, peer_id: &str) -> bool {
        self.shield.is_excluded(peer_id) || self.detector.is_excluded(peer_id)
    }
}
