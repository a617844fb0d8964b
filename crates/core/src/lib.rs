//! Core functionality for the Palisade mesh trust layer.
//!
//! This crate provides the fundamental types, traits, and utilities used
//! across the Palisade workspace: peer identifiers, the clock abstraction,
//! the exclusion predicate, configuration, and logging setup.

pub mod config;
pub mod error;
pub mod logging;
pub mod sync;
pub mod types;

pub use config::{Config, DetectorConfig, LogFormat, NodeConfig, ShieldConfig};
pub use error::{Error, Result};
pub use sync::{MutexExt, RwLockExt};
pub use types::{
    current_timestamp_ms, ms_to_secs, Clock, ExclusionSource, ManualClock, PeerId, SystemClock,
};
