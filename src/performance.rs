//! In-process performance sampling.
//!
//! The [`PerformanceMonitor`] keeps a bounded, time-limited store of timing
//! samples: navigation, resource and long-task entries pushed by the
//! platform, plus durations measured around functions and API calls. A
//! [`PerformanceBudget`] turns slow measurements into recorded violations.

pub mod budget;
pub mod monitor;
pub mod observer;
pub mod summary;

pub use budget::{BudgetViolation, PerformanceBudget};
pub use monitor::{PerformanceMonitor, SweepOutcome};
pub use observer::{
    ChannelEntrySource, EntryType, ObserverError, PerformanceEntry, PerformanceEntrySource,
};
pub use summary::{CallSummary, PerformanceSummary, WindowSummary};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;

/// Kind of a stored sample.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetricType {
    Navigation,
    Resource,
    LongTask,
    Function,
    Api,
    Custom(String),
}

impl MetricType {
    pub fn as_str(&self) -> &str {
        match self {
            MetricType::Navigation => "navigation",
            MetricType::Resource => "resource",
            MetricType::LongTask => "longtask",
            MetricType::Function => "function",
            MetricType::Api => "api",
            MetricType::Custom(name) => name.as_str(),
        }
    }
}

impl From<String> for MetricType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "navigation" => MetricType::Navigation,
            "resource" => MetricType::Resource,
            "longtask" => MetricType::LongTask,
            "function" => MetricType::Function,
            "api" => MetricType::Api,
            _ => MetricType::Custom(value),
        }
    }
}

impl From<&str> for MetricType {
    fn from(value: &str) -> Self {
        MetricType::from(value.to_string())
    }
}

impl From<MetricType> for String {
    fn from(value: MetricType) -> Self {
        match value {
            MetricType::Custom(name) => name,
            other => other.as_str().to_string(),
        }
    }
}

impl From<EntryType> for MetricType {
    fn from(value: EntryType) -> Self {
        match value {
            EntryType::Navigation => MetricType::Navigation,
            EntryType::Resource => MetricType::Resource,
            EntryType::LongTask => MetricType::LongTask,
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored sample.
#[derive(Debug, Clone, Serialize)]
pub struct MetricRecord {
    pub key: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub data: serde_json::Value,
    pub timestamp: DateTime<Utc>,
    /// Monotonic capture time; drives age eviction and summaries.
    #[serde(skip)]
    pub recorded_at: Instant,
    /// Insertion order, for stable newest-first listing
    #[serde(skip)]
    pub sequence: u64,
}

impl MetricRecord {
    pub fn duration_ms(&self) -> Option<f64> {
        self.data.get("duration_ms").and_then(serde_json::Value::as_f64)
    }

    pub fn success(&self) -> Option<bool> {
        self.data.get("success").and_then(serde_json::Value::as_bool)
    }

    /// Sort key from oldest to newest. Insertion order breaks ties between
    /// samples recorded at the same instant.
    pub fn age_order(&self) -> (Instant, u64) {
        (self.recorded_at, self.sequence)
    }
}
