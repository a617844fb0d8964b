//! Core types shared by the shield, the Byzantine detector and the trust facade.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Unique identifier for a peer in the mesh
pub type PeerId = String;

/// Source of wall-clock time in Unix milliseconds.
///
/// Thresholds are evaluated against this clock so that passes can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync {
    /// Current time (Unix epoch milliseconds)
    fn now_ms(&self) -> u64;
}

/// Clock backed by the operating system
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        current_timestamp_ms()
    }
}

/// Manually advanced clock for tests and simulations
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: AtomicU64,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: AtomicU64::new(start_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Predicate answering whether a peer must be kept out of routing and consensus.
///
/// The shield (liveness) and the Byzantine detector (isolation) each implement
/// it over their own evidence; a peer is usable only if no source excludes it.
pub trait ExclusionSource: Send + Sync {
    fn is_excluded(&self, peer_id: &str) -> bool;
}

/// Get current timestamp in milliseconds since Unix epoch
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

/// Convert a millisecond quantity to fractional seconds
pub fn ms_to_secs(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
