//! Mesh Shield
//!
//! Self-healing failure detection for mesh peers:
//! - Beacon-silence based liveness classification
//! - Time-boxed quarantine of failed peers
//! - Rerouting of active paths around failures
//! - MTTD / MTTR accounting and JSON metric export
//!
//! The shield only judges liveness. Byzantine behavior is tracked by the
//! detector in `palisade-byzantine`; callers combine both views through
//! [`palisade_core::ExclusionSource`].

pub mod error;
pub mod metrics;
pub mod peer;
pub mod routing;
pub mod scheduler;
pub mod shield;

pub use error::{ShieldError, ShieldResult};
pub use metrics::{
    FailureCause, FailureEvent, MetricsExport, RecoveryCounters, ShieldMetrics,
    EXPORTED_FAILURE_EVENTS,
};
pub use peer::{NodeStatusEntry, PeerHealth, PeerHealthTable, PeerStatus};
pub use routing::{rank_next_hops, RerouteOutcome, RouteTable, RANKED_PATH_LEN};
pub use scheduler::Pass;
pub use shield::{BeaconSink, HealthCheckSummary, MeshShield};
