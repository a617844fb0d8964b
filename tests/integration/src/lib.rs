//! Cross-crate scenario tests for the Palisade trust layer
//!
//! This test suite validates:
//! - Beacon-loss detection, quarantine and rerouting through the facade
//! - Byzantine detection and isolation from consensus validation
//! - Combined exclusion across liveness and isolation
//! - Configuration loading, scheduled passes and metric export

pub mod test_utils;

#[cfg(test)]
mod red_cell_assault;

#[cfg(test)]
mod shield_failover_tests;

#[cfg(test)]
mod trust_mesh_tests;
