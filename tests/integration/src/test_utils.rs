//! Test utilities for cross-crate scenario tests

use palisade_core::{Config, ManualClock};
use palisade_trust_mesh::TrustMesh;
use std::sync::{Arc, Once};
use std::time::Duration;

/// Fixed start instant for simulated time
pub const T0: u64 = 1_700_000_000_000;

static TRACING: Once = Once::new();

/// Route test logs through the test writer once per process
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_test_writer()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .try_init();
    });
}

/// Trust mesh driven by a manual clock
pub struct MeshHarness {
    pub clock: Arc<ManualClock>,
    pub mesh: TrustMesh,
}

impl MeshHarness {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        init_tracing();
        let clock = Arc::new(ManualClock::new(T0));
        let mesh = TrustMesh::with_clock(&config, clock.clone());
        Self { clock, mesh }
    }

    pub fn now_ms(&self) -> u64 {
        use palisade_core::Clock;
        self.clock.now_ms()
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(Duration::from_millis(ms));
    }

    /// Every peer in `peers` beacons with `latency_ms`
    pub fn beacon_all(&self, peers: &[&str], latency_ms: f64) {
        for peer in peers {
            self.mesh.on_peer_beacon(peer, latency_ms);
        }
    }
}

impl Default for MeshHarness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}
