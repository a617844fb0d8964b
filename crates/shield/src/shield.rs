//! MeshShield - failure detection, quarantine and rerouting
//!
//! Liveness is judged purely from elapsed beacon silence. A failed peer is
//! quarantined and every active route through it is moved elsewhere in the
//! same critical section, so routing never observes a half-handled failure.
//!
//! # Lock order
//!
//! peers → routes → failure log → counters. Nothing here awaits while a lock
//! is held.

use crate::error::{ShieldError, ShieldResult};
use crate::metrics::{
    FailureCause, FailureEvent, MetricsExport, RecoveryCounters, ShieldMetrics,
    EXPORTED_FAILURE_EVENTS,
};
use crate::peer::{NodeStatusEntry, PeerHealth, PeerHealthTable, PeerStatus};
use crate::routing::{rank_next_hops, RerouteOutcome, RouteTable};
use crate::scheduler::{spawn_pass, Pass};
use palisade_core::{
    ms_to_secs, Clock, ExclusionSource, MutexExt, PeerId, RwLockExt, ShieldConfig, SystemClock,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{error, info, trace, warn};

/// Outbound side of beacon bookkeeping, implemented by the transport.
///
/// Called from the beacon pass without any shield lock held. Implementations
/// must not block; queue the datagram and return.
pub trait BeaconSink: Send + Sync {
    fn send_beacon(&self, peer_id: &str);
}

/// What one health-evaluation pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HealthCheckSummary {
    /// Peers whose silence was evaluated
    pub evaluated: usize,
    /// Peers downgraded from Healthy to Degraded
    pub degraded: Vec<PeerId>,
    /// Peers declared failed, quarantined and routed around
    pub failed: Vec<PeerId>,
}

/// Self-healing liveness engine for the local node's view of the mesh
pub struct MeshShield {
    node_id: String,
    config: ShieldConfig,
    clock: Arc<dyn Clock>,
    peers: RwLock<PeerHealthTable>,
    routes: Mutex<RouteTable>,
    failure_events: Mutex<Vec<FailureEvent>>,
    counters: Mutex<RecoveryCounters>,
    beacon_sink: Option<Arc<dyn BeaconSink>>,
    running: AtomicBool,
    generation: AtomicU64,
}

impl MeshShield {
    /// Create a shield driven by the system clock
    pub fn new(node_id: impl Into<String>, config: ShieldConfig) -> Self {
        Self::with_clock(node_id, config, Arc::new(SystemClock))
    }

    /// Create a shield driven by an explicit clock
    pub fn with_clock(
        node_id: impl Into<String>,
        config: ShieldConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            config,
            clock,
            peers: RwLock::new(PeerHealthTable::new()),
            routes: Mutex::new(RouteTable::new()),
            failure_events: Mutex::new(Vec::new()),
            counters: Mutex::new(RecoveryCounters::default()),
            beacon_sink: None,
            running: AtomicBool::new(false),
            generation: AtomicU64::new(0),
        }
    }

    /// Attach the transport hook used by the beacon pass
    pub fn with_beacon_sink(mut self, sink: Arc<dyn BeaconSink>) -> Self {
        self.beacon_sink = Some(sink);
        self
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.config
    }

    /// Start monitoring a peer. No-op for known peers.
    pub fn register_node(&self, peer_id: &str) {
        let mut peers = self.peers.write_or_recover();
        let now = self.clock.now_ms();
        if peers.register(peer_id, now) {
            info!(peer_id, "Registered peer for monitoring");
        }
    }

    /// Process one liveness signal.
    ///
    /// A beacon from a `Dead` or `Quarantined` peer completes its recovery;
    /// this is the only way out of quarantine.
    ///
    /// A latency that is negative or not finite is not stored. It counts as
    /// high latency, so a healthy peer reporting it is degraded.
    pub fn receive_beacon(&self, peer_id: &str, latency_ms: f64) {
        let measured = (latency_ms.is_finite() && latency_ms >= 0.0).then_some(latency_ms);
        if measured.is_none() {
            warn!(peer_id, latency_ms, "Beacon carried an invalid latency");
        }


        let mut peers = self.peers.write_or_recover();
        let now = self.clock.now_ms();

        if peers.register(peer_id, now) {
            info!(peer_id, "Registered peer for monitoring");
        }
        let Some(peer) = peers.get_mut(peer_id) else {
            return;
        };

        // Last writer wins by timestamp, not by call order
        peer.last_beacon_ms = peer.last_beacon_ms.max(now);
        if let Some(latency_ms) = measured {
            peer.latency_ms = latency_ms;
        }

        match peer.status {
            PeerStatus::Quarantined | PeerStatus::Dead => {
                peer.status = PeerStatus::Healthy;
                peer.quarantine_until_ms = 0;
                peer.recovery_count += 1;
                info!(
                    peer_id,
                    recoveries = peer.recovery_count,
                    "Peer recovered and active"
                );
            }
            PeerStatus::Healthy | PeerStatus::Degraded => {
                let next = if measured.map_or(true, |l| l > self.config.high_latency_ms) {
                    PeerStatus::Degraded
                } else {
                    PeerStatus::Healthy
                };
                if next != peer.status {
                    info!(
                        peer_id,
                        latency_ms,
                        from = peer.status.as_str(),
                        to = next.as_str(),
                        "Peer status changed on beacon"
                    );
                }
                peer.status = next;
            }
        }

        peer.scale_reputation(self.config.reputation_recovery);
    }

    /// Evaluate beacon silence for every peer once.
    ///
    /// Quarantined peers are skipped even after their window expires: an
    /// outage produces exactly one failure event, and only a beacon ends it.
    pub fn run_health_check(&self) -> HealthCheckSummary {
        let mut peers = self.peers.write_or_recover();
        let now = self.clock.now_ms();
        let mut summary = HealthCheckSummary::default();
        if peers.is_empty() {
            trace!("No peers to evaluate");
            return summary;
        }
        let mut failing = Vec::new();

        for peer in peers.iter_mut() {
            if peer.is_quarantined(now) {
                continue;
            }
            match peer.status {
                PeerStatus::Quarantined | PeerStatus::Dead => continue,
                PeerStatus::Healthy | PeerStatus::Degraded => {}
            }

            summary.evaluated += 1;
            let silence_ms = peer.silence_ms(now);

            if silence_ms > self.config.failure_threshold_ms {
                failing.push((peer.peer_id.clone(), silence_ms));
            } else if silence_ms > self.config.degraded_threshold_ms
                && peer.status == PeerStatus::Healthy
            {
                peer.status = PeerStatus::Degraded;
                warn!(
                    peer_id = %peer.peer_id,
                    beacon_delay = ms_to_secs(silence_ms),
                    "Peer degraded"
                );
                summary.degraded.push(peer.peer_id.clone());
            }
        }

        failing.sort();
        for (peer_id, silence_ms) in failing {
            self.handle_failure(&mut peers, &peer_id, silence_ms);
            summary.failed.push(peer_id);
        }

        summary
    }

    /// Dead → quarantine → reroute, run to completion under the peer lock
    fn handle_failure(&self, peers: &mut PeerHealthTable, peer_id: &str, silence_ms: u64) {
        let failure_start = self.clock.now_ms();
        let detection_time = ms_to_secs(silence_ms);

        let Some(peer) = peers.get_mut(peer_id) else {
            return;
        };
        peer.status = PeerStatus::Dead;
        peer.failure_count += 1;
        peer.scale_reputation(self.config.reputation_decay);
        error!(
            peer_id,
            detection_time,
            failures = peer.failure_count,
            "Peer failed"
        );

        peer.status = PeerStatus::Quarantined;
        peer.quarantine_until_ms = failure_start + self.config.quarantine_duration_ms;
        warn!(
            peer_id,
            quarantine_secs = ms_to_secs(self.config.quarantine_duration_ms),
            "Peer quarantined"
        );

        {
            let mut counters = self.counters.lock_or_recover();
            counters.record_detection(detection_time);
            counters.record_quarantine();
        }

        let outcomes = self
            .routes
            .lock_or_recover()
            .reroute(peer_id, peers, failure_start);
        for (destination, outcome) in &outcomes {
            match outcome {
                RerouteOutcome::Backup(path) => {
                    info!(peer_id, %destination, ?path, "Rerouted to backup path")
                }
                RerouteOutcome::Recomputed(path) => {
                    info!(peer_id, %destination, ?path, "Rerouted to ranked path")
                }
                RerouteOutcome::Dropped => {
                    warn!(peer_id, %destination, "No routable peers left, route dropped")
                }
            }
        }

        let recovery_time = ms_to_secs(self.clock.now_ms().saturating_sub(failure_start));
        self.failure_events.lock_or_recover().push(FailureEvent {
            peer_id: peer_id.to_string(),
            timestamp: ms_to_secs(failure_start),
            detection_time,
            recovery_time,
            cause: FailureCause::BeaconTimeout,
            recovered: true,
        });
        self.counters.lock_or_recover().record_recovery(recovery_time);

        info!(
            peer_id,
            recovery_time,
            rerouted = outcomes.len(),
            "Routing restored after peer failure"
        );
    }

    /// Slow reputation drift independent of discrete events
    pub fn run_reputation_drift(&self) {
        let mut peers = self.peers.write_or_recover();
        for peer in peers.iter_mut() {
            match peer.status {
                PeerStatus::Healthy => peer.scale_reputation(self.config.healthy_drift),
                PeerStatus::Degraded => peer.scale_reputation(self.config.degraded_drift),
                PeerStatus::Quarantined | PeerStatus::Dead => {}
            }
        }
    }

    /// Hand every non-quarantined peer to the beacon sink. Returns the number of targets.
    pub fn run_beacon_pass(&self) -> usize {
        let targets: Vec<PeerId> = {
            let peers = self.peers.read_or_recover();
            let now = self.clock.now_ms();
            peers
                .iter()
                .filter(|p| !p.is_quarantined(now))
                .map(|p| p.peer_id.clone())
                .collect()
        };

        match &self.beacon_sink {
            Some(sink) => {
                for peer_id in &targets {
                    sink.send_beacon(peer_id);
                }
            }
            None => trace!(targets = targets.len(), "No beacon sink attached"),
        }

        targets.len()
    }

    /// Spawn the beacon, health-check and reputation-drift passes.
    ///
    /// Must be called from within a tokio runtime. The returned handles finish
    /// at the first tick after [`MeshShield::stop`]. The configuration is
    /// validated first; nothing is spawned when it is rejected.
    pub fn start(self: &Arc<Self>) -> ShieldResult<Vec<JoinHandle<()>>> {
        self.config.validate()?;
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ShieldError::AlreadyRunning {
                node_id: self.node_id.clone(),
            });
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        info!(node_id = %self.node_id, generation, "MeshShield started");

        Ok(vec![
            spawn_pass(Arc::clone(self), Pass::Beacon, self.config.beacon_interval(), generation),
            spawn_pass(
                Arc::clone(self),
                Pass::HealthCheck,
                self.config.health_check_interval(),
                generation,
            ),
            spawn_pass(
                Arc::clone(self),
                Pass::ReputationDrift,
                self.config.reputation_interval(),
                generation,
            ),
        ])
    }

    /// Flip the running flag; each pass exits at its next wake-up
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::SeqCst) {
            info!(node_id = %self.node_id, "MeshShield stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether passes spawned for `generation` should keep running
    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.is_running() && self.generation.load(Ordering::SeqCst) == generation
    }

    pub fn get_metrics(&self) -> ShieldMetrics {
        let peers = self.peers.read_or_recover();
        let now = self.clock.now_ms();
        self.counters.lock_or_recover().snapshot(&peers, now)
    }

    /// Status rows for every known peer, sorted by peer ID
    pub fn get_node_status(&self) -> Vec<NodeStatusEntry> {
        let peers = self.peers.read_or_recover();
        let now = self.clock.now_ms();
        let mut rows: Vec<NodeStatusEntry> = peers.iter().map(|p| p.status_entry(now)).collect();
        rows.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        rows
    }

    /// Liveness view only: Byzantine isolation is tracked separately and must
    /// be checked as well before using a peer.
    pub fn get_healthy_peers(&self) -> Vec<PeerId> {
        let peers = self.peers.read_or_recover();
        peers.healthy_peers(self.clock.now_ms())
    }

    pub fn get_peer(&self, peer_id: &str) -> Option<PeerHealth> {
        self.peers.read_or_recover().get(peer_id).cloned()
    }

    pub fn peer_count(&self) -> usize {
        self.peers.read_or_recover().len()
    }

    pub fn failure_events(&self) -> Vec<FailureEvent> {
        self.failure_events.lock_or_recover().clone()
    }

    pub fn set_route(&self, destination: impl Into<String>, path: Vec<PeerId>) {
        self.routes.lock_or_recover().set_route(destination.into(), path);
    }

    pub fn set_backup_route(&self, destination: impl Into<String>, path: Vec<PeerId>) {
        self.routes
            .lock_or_recover()
            .set_backup_route(destination.into(), path);
    }

    pub fn active_route(&self, destination: &str) -> Option<Vec<PeerId>> {
        self.routes.lock_or_recover().active_route(destination).cloned()
    }

    pub fn active_routes(&self) -> HashMap<String, Vec<PeerId>> {
        self.routes.lock_or_recover().active_routes().clone()
    }

    /// Rank the currently routable peers, skipping `exclude`
    pub fn calculate_route(&self, exclude: &[&str]) -> Vec<PeerId> {
        let peers = self.peers.read_or_recover();
        rank_next_hops(peers.iter(), exclude, self.clock.now_ms())
    }

    /// Build the export document without touching the filesystem
    pub fn export_snapshot(&self) -> MetricsExport {
        let metrics = self.get_metrics();
        let nodes = self.get_node_status();
        let failure_events = {
            let events = self.failure_events.lock_or_recover();
            let skip = events.len().saturating_sub(EXPORTED_FAILURE_EVENTS);
            events[skip..].to_vec()
        };

        MetricsExport {
            timestamp: ms_to_secs(self.clock.now_ms()),
            node_id: self.node_id.clone(),
            metrics,
            nodes,
            failure_events,
        }
    }

    /// Write metrics, per-peer status and the last 100 failure events as JSON
    pub fn export_metrics(&self, path: impl AsRef<Path>) -> ShieldResult<()> {
        let path = path.as_ref();
        let document = serde_json::to_string_pretty(&self.export_snapshot())?;
        std::fs::write(path, document)?;
        info!(path = %path.display(), "Shield metrics exported");
        Ok(())
    }
}

impl ExclusionSource for MeshShield {
    /// Unknown peers carry no liveness evidence and are not excluded here
    fn is_excluded(&self, peer_id: &str) -> bool {
        self.peers
            .read_or_recover()
            .get(peer_id)
            .map(|p| p.status.is_unusable())
            .unwrap_or(false)
    }
}
