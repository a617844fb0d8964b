//! Error types for shield operations.
//!
//! Liveness tracking itself never fails; errors only arise at the edges
//! (lifecycle, configuration and metric export).

use thiserror::Error;

/// Errors that can occur in shield operations.
#[derive(Debug, Error)]
pub enum ShieldError {
    /// `start` called while the periodic passes are running
    #[error("Shield already running for node {node_id}")]
    AlreadyRunning { node_id: String },

    /// Configuration rejected by `start`
    #[error("Invalid shield configuration: {0}")]
    Config(#[from] palisade_core::Error),

    /// Writing an export failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for shield operations.
pub type ShieldResult<T> = Result<T, ShieldError>;
