//! Configuration management for Palisade.
//!
//! Every field carries a default, so an empty TOML document yields a
//! working configuration and operators only override what they need.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub node: NodeConfig,
    pub shield: ShieldConfig,
    pub byzantine: DetectorConfig,
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub node_id: String,
    pub log_level: String,
    pub log_format: LogFormat,
    /// Destination of the periodic metrics export
    pub export_path: String,
    /// Zero disables periodic export
    pub export_interval_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: "node-001".to_string(),
            log_level: "info".to_string(),
            log_format: LogFormat::Plain,
            export_path: "mesh_shield_metrics.json".to_string(),
            export_interval_ms: 60_000,
        }
    }
}

/// Failure detector and quarantine thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShieldConfig {
    pub beacon_interval_ms: u64,
    pub health_check_interval_ms: u64,
    pub reputation_interval_ms: u64,
    /// Silence after which a peer is declared failed
    pub failure_threshold_ms: u64,
    /// Silence after which a healthy peer is downgraded
    pub degraded_threshold_ms: u64,
    pub quarantine_duration_ms: u64,
    pub high_latency_ms: f64,
    /// Multiplier applied on each detected failure
    pub reputation_decay: f64,
    /// Multiplier applied on each received beacon
    pub reputation_recovery: f64,
    /// Periodic multiplier for degraded peers
    pub degraded_drift: f64,
    /// Periodic multiplier for healthy peers
    pub healthy_drift: f64,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            beacon_interval_ms: 500,
            health_check_interval_ms: 1_000,
            reputation_interval_ms: 10_000,
            failure_threshold_ms: 3_000,
            degraded_threshold_ms: 1_500,
            quarantine_duration_ms: 30_000,
            high_latency_ms: 500.0,
            reputation_decay: 0.95,
            reputation_recovery: 1.02,
            degraded_drift: 0.999,
            healthy_drift: 1.001,
        }
    }
}

impl ShieldConfig {
    pub fn beacon_interval(&self) -> Duration {
        Duration::from_millis(self.beacon_interval_ms)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_interval_ms)
    }

    pub fn reputation_interval(&self) -> Duration {
        Duration::from_millis(self.reputation_interval_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.beacon_interval_ms == 0
            || self.health_check_interval_ms == 0
            || self.reputation_interval_ms == 0
        {
            return Err(Error::InvalidConfig(
                "shield pass intervals must be non-zero".to_string(),
            ));
        }
        if self.degraded_threshold_ms >= self.failure_threshold_ms {
            return Err(Error::InvalidConfig(format!(
                "degraded threshold ({} ms) must be below failure threshold ({} ms)",
                self.degraded_threshold_ms, self.failure_threshold_ms
            )));
        }
        let factors = [
            ("reputation_decay", self.reputation_decay),
            ("reputation_recovery", self.reputation_recovery),
            ("degraded_drift", self.degraded_drift),
            ("healthy_drift", self.healthy_drift),
        ];
        for (name, value) in factors {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be a positive finite factor, got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Byzantine detector tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Reports needed (including the current one) before corroboration kicks in
    pub min_evidence_nodes: usize,
    /// Scores below this make a suspect more believable
    pub reputation_threshold: f64,
    pub corroboration_window_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            min_evidence_nodes: 2,
            reputation_threshold: 0.3,
            corroboration_window_ms: 300_000,
        }
    }
}

impl DetectorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_evidence_nodes == 0 {
            return Err(Error::InvalidConfig(
                "min_evidence_nodes must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.reputation_threshold) {
            return Err(Error::InvalidConfig(format!(
                "reputation_threshold must lie in [0, 1], got {}",
                self.reputation_threshold
            )));
        }
        Ok(())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.node.node_id.trim().is_empty() {
            return Err(Error::InvalidConfig("node_id must not be empty".to_string()));
        }
        self.shield.validate()?;
        self.byzantine.validate()
    }
}
