use crate::config::defaults::default_budgets;
use crate::config::PerformanceConfig;
use crate::metrics::RuntimeMetrics;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

pub const API_CALL: &str = "api_call";
pub const FUNCTION_EXECUTION: &str = "function_execution";
pub const PAGE_LOAD: &str = "page_load";
pub const COMPONENT_RENDER: &str = "component_render";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BudgetViolation {
    pub budget_type: String,
    pub duration_ms: f64,
    pub budget_ms: u64,
    pub timestamp: DateTime<Utc>,
}

/// Named duration thresholds and a bounded log of the times they were
/// exceeded. Unknown budget types are always within budget.
#[derive(Debug)]
pub struct PerformanceBudget {
    budgets: DashMap<String, u64>,
    violations: Mutex<VecDeque<BudgetViolation>>,
    max_violations: usize,
    metrics: Option<Arc<RuntimeMetrics>>,
}

impl Default for PerformanceBudget {
    fn default() -> Self {
        Self::from_config(&PerformanceConfig::default(), None)
    }
}

impl PerformanceBudget {
    /// Built-in budgets overlaid with the configured ones.
    pub fn from_config(config: &PerformanceConfig, metrics: Option<Arc<RuntimeMetrics>>) -> Self {
        let budgets: DashMap<String, u64> = default_budgets().into_iter().collect();
        for (name, ms) in &config.budgets {
            budgets.insert(name.clone(), *ms);
        }
        Self {
            budgets,
            violations: Mutex::new(VecDeque::new()),
            max_violations: config.max_violations.max(1),
            metrics,
        }
    }

    pub fn set_budget(&self, budget_type: impl Into<String>, budget_ms: u64) {
        self.budgets.insert(budget_type.into(), budget_ms);
    }

    pub fn budget_for(&self, budget_type: &str) -> Option<u64> {
        self.budgets.get(budget_type).map(|entry| *entry)
    }

    /// Whether `duration` fits in the `budget_type` budget. Over-budget
    /// durations are logged and recorded as violations.
    pub fn check_budget(&self, budget_type: &str, duration: Duration) -> bool {
        let Some(budget_ms) = self.budget_for(budget_type) else {
            return true;
        };
        let duration_ms = duration.as_micros() as f64 / 1000.0;
        if duration_ms <= budget_ms as f64 {
            return true;
        }

        tracing::warn!(
            budget_type,
            duration_ms,
            budget_ms,
            "Performance budget exceeded"
        );
        if let Some(metrics) = &self.metrics {
            metrics.increment_budget_violations();
        }

        let mut violations = self.violations.lock().unwrap_or_else(PoisonError::into_inner);
        while violations.len() >= self.max_violations {
            violations.pop_front();
        }
        violations.push_back(BudgetViolation {
            budget_type: budget_type.to_string(),
            duration_ms,
            budget_ms,
            timestamp: Utc::now(),
        });
        false
    }

    /// Recorded violations, oldest first.
    pub fn violations(&self) -> Vec<BudgetViolation> {
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn clear_violations(&self) {
        self.violations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn over_budget_api_call_is_recorded() {
        let budget = PerformanceBudget::default();

        assert!(!budget.check_budget(API_CALL, Duration::from_millis(6000)));

        let violations = budget.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].budget_type, API_CALL);
        assert_eq!(violations[0].duration_ms, 6000.0);
        assert_eq!(violations[0].budget_ms, 5000);
    }

    #[test]
    fn within_budget_and_unknown_types_pass() {
        let budget = PerformanceBudget::default();
        assert!(budget.check_budget(API_CALL, Duration::from_millis(5000)));
        assert!(budget.check_budget(COMPONENT_RENDER, Duration::from_millis(99)));
        assert!(budget.check_budget("chart_render", Duration::from_secs(60)));
        assert!(budget.violations().is_empty());
    }

    #[test]
    fn configured_budgets_override_defaults() {
        let config = PerformanceConfig {
            budgets: [(PAGE_LOAD.to_string(), 1500)].into_iter().collect(),
            ..PerformanceConfig::default()
        };
        let budget = PerformanceBudget::from_config(&config, None);

        assert_eq!(budget.budget_for(PAGE_LOAD), Some(1500));
        assert_eq!(budget.budget_for(API_CALL), Some(5000));

        budget.set_budget("chart_render", 50);
        assert!(!budget.check_budget("chart_render", Duration::from_millis(51)));
    }

    #[test]
    fn violation_log_is_bounded() {
        let config = PerformanceConfig {
            max_violations: 3,
            ..PerformanceConfig::default()
        };
        let metrics = Arc::new(RuntimeMetrics::new());
        let budget = PerformanceBudget::from_config(&config, Some(metrics.clone()));

        for ms in 1001..=1005 {
            budget.check_budget(FUNCTION_EXECUTION, Duration::from_millis(ms));
        }

        let kept: Vec<f64> = budget.violations().iter().map(|v| v.duration_ms).collect();
        assert_eq!(kept, vec![1003.0, 1004.0, 1005.0]);
        assert_eq!(metrics.snapshot().performance.budget_violations, 5);

        budget.clear_violations();
        assert!(budget.violations().is_empty());
    }
}
