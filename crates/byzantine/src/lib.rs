//! Byzantine Detection
//!
//! This crate scores reports of Byzantine behavior from the consensus and
//! aggregation layers:
//! - Interaction-based reputation with exponential violation decay
//! - Confidence and severity classification of reports
//! - Corroboration of repeated reports within a time window
//! - Indefinite network isolation of severe offenders
//! - Majority validation of consensus proposals
//!
//! Isolation is independent of liveness quarantine in `palisade-shield`.

pub mod alert;
pub mod detector;
pub mod reputation;
pub mod stats;

pub use alert::{alert_id, ByzantineAlert, ByzantineBehavior, Evidence, Severity, NETWORK_ISOLATION};
pub use detector::{ByzantineDetector, ConsensusRecord};
pub use reputation::{NodeReputation, TrustLevel, TRUSTED_REPORTER_SCORE, VIOLATION_DECAY};
pub use stats::{DetectorStatistics, ReputationBreakdown, StatisticsPeriod};
