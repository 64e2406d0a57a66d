// Live aggregate metrics and the analytics snapshot delivered to subscribers

use serde::{Deserialize, Serialize};

/// Point-in-time aggregate over the in-boundary roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMetrics {
    pub timestamp: u64,
    pub total_in_boundary: u32,
    pub moving_count: u32,
    pub parked_count: u32,
    pub violating_count: u32,
    pub warnings_count: u32,
    pub avg_violation_ms: u64,
}

impl LiveMetrics {
    /// Zeroed metrics stamped at `timestamp`.
    pub fn empty(timestamp: u64) -> Self {
        Self {
            timestamp,
            ..Self::default()
        }
    }

    /// Compares every aggregate field, ignoring `timestamp`.
    pub fn same_values(&self, other: &LiveMetrics) -> bool {
        self.total_in_boundary == other.total_in_boundary
            && self.moving_count == other.moving_count
            && self.parked_count == other.parked_count
            && self.violating_count == other.violating_count
            && self.warnings_count == other.warnings_count
            && self.avg_violation_ms == other.avg_violation_ms
    }
}

/// Latest metrics plus the rolling per-minute violation series.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    #[serde(flatten)]
    pub metrics: LiveMetrics,
    pub timestamps: Vec<u64>,
    pub violations_series: Vec<u32>,
}
