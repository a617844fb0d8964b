//! Periodic pass supervision.
//!
//! Each tick runs its pass in a child task so that a panic is caught at the
//! task boundary, logged, and retried on the next tick with shield state kept.

use crate::shield::MeshShield;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Background work driven by [`MeshShield::start`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Beacon,
    HealthCheck,
    ReputationDrift,
}

impl Pass {
    pub fn name(&self) -> &'static str {
        match self {
            Pass::Beacon => "beacon",
            Pass::HealthCheck => "health_check",
            Pass::ReputationDrift => "reputation_drift",
        }
    }

    fn run(&self, shield: &MeshShield) {
        match self {
            Pass::Beacon => {
                shield.run_beacon_pass();
            }
            Pass::HealthCheck => {
                let summary = shield.run_health_check();
                if !summary.failed.is_empty() {
                    debug!(failed = ?summary.failed, "Health pass handled failures");
                }
            }
            Pass::ReputationDrift => shield.run_reputation_drift(),
        }
    }
}

/// Run `pass` every `period` until the shield stops or is restarted
pub(crate) fn spawn_pass(
    shield: Arc<MeshShield>,
    pass: Pass,
    period: Duration,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(
            pass = pass.name(),
            period_ms = period.as_millis() as u64,
            "Starting shield pass"
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if !shield.is_current(generation) {
                break;
            }

            let worker = Arc::clone(&shield);
            let handle = tokio::spawn(async move {
                pass.run(&worker);
            });

            match handle.await {
                Ok(()) => {}
                Err(e) => {
                    if e.is_panic() {
                        error!(pass = pass.name(), error = ?e, "Shield pass panicked - recovering");
                    } else if e.is_cancelled() {
                        warn!(pass = pass.name(), "Shield pass was cancelled");
                    }
                }
            }
        }

        debug!(pass = pass.name(), "Shield pass stopped");
    })
}
