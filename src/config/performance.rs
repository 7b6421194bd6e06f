//! Performance monitor and budget configuration types.

use super::defaults::{
    default_budgets, default_default_metrics_limit, default_max_budget_violations,
    default_max_metrics_age_secs, default_max_metrics_count, default_sweep_interval_secs,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Retention and budget settings for the performance monitor.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct PerformanceConfig {
    /// Samples older than this are evicted by the sweep (seconds)
    #[serde(default = "default_max_metrics_age_secs")]
    pub max_metrics_age_secs: u64,
    /// Upper bound on retained samples after age eviction
    #[serde(default = "default_max_metrics_count")]
    pub max_metrics_count: usize,
    /// Period of the eviction sweep (seconds)
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
    /// Default page size for `get_metrics`
    #[serde(default = "default_default_metrics_limit")]
    pub default_limit: usize,
    /// Budget thresholds in milliseconds, merged over the built-in defaults
    #[serde(default = "default_budgets")]
    pub budgets: BTreeMap<String, u64>,
    /// Number of budget violations retained
    #[serde(default = "default_max_budget_violations")]
    pub max_violations: usize,
}

impl PerformanceConfig {
    #[must_use]
    pub const fn max_metrics_age(&self) -> Duration {
        Duration::from_secs(self.max_metrics_age_secs)
    }

    #[must_use]
    pub const fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            max_metrics_age_secs: default_max_metrics_age_secs(),
            max_metrics_count: default_max_metrics_count(),
            sweep_interval_secs: default_sweep_interval_secs(),
            default_limit: default_default_metrics_limit(),
            budgets: default_budgets(),
            max_violations: default_max_budget_violations(),
        }
    }
}
