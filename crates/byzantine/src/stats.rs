//! Detector statistics over a time window.

use crate::alert::{ByzantineAlert, ByzantineBehavior, Severity};
use crate::reputation::{NodeReputation, TrustLevel};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Window queried by `get_statistics`. Missing bounds are open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsPeriod {
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
}

impl StatisticsPeriod {
    pub fn contains(&self, timestamp_ms: u64) -> bool {
        self.start_ms.map_or(true, |start| timestamp_ms >= start)
            && self.end_ms.map_or(true, |end| timestamp_ms <= end)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReputationBreakdown {
    pub total: usize,
    /// Only levels with at least one peer appear
    pub by_trust_level: BTreeMap<TrustLevel, usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectorStatistics {
    /// Alerts inside the period
    pub total_alerts: usize,
    pub by_behavior: BTreeMap<ByzantineBehavior, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    /// Currently isolated, regardless of period
    pub isolated_nodes: usize,
    pub node_reputations: ReputationBreakdown,
    pub period: StatisticsPeriod,
}

impl DetectorStatistics {
    pub(crate) fn collect<'a>(
        alerts: impl Iterator<Item = &'a ByzantineAlert>,
        reputations: impl Iterator<Item = &'a NodeReputation>,
        isolated_nodes: usize,
        period: StatisticsPeriod,
    ) -> Self {
        let mut stats = DetectorStatistics {
            isolated_nodes,
            period,
            ..Default::default()
        };

        for alert in alerts.filter(|a| period.contains(a.timestamp_ms)) {
            stats.total_alerts += 1;
            *stats.by_behavior.entry(alert.behavior_type).or_insert(0) += 1;
            *stats.by_severity.entry(alert.severity).or_insert(0) += 1;
        }

        for reputation in reputations {
            stats.node_reputations.total += 1;
            *stats
                .node_reputations
                .by_trust_level
                .entry(reputation.trust_level)
                .or_insert(0) += 1;
        }

        stats
    }
}
