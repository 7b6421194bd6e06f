use super::{MetricRecord, MetricType};
use crate::metrics::LatencyTracker;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::time::{Duration, Instant};

pub const LAST_FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);
pub const LAST_HOUR: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CallSummary {
    pub count: usize,
    pub success_count: usize,
    /// Fraction of successful calls, absent when nothing was measured
    pub success_rate: Option<f64>,
    pub average_duration_ms: Option<f64>,
    pub p95_duration_ms: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowSummary {
    pub total_metrics: usize,
    pub api: CallSummary,
    pub function: CallSummary,
    pub navigation_count: usize,
    pub resource_count: usize,
    pub long_task_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceSummary {
    pub generated_at: DateTime<Utc>,
    pub last_5_minutes: WindowSummary,
    pub last_hour: WindowSummary,
}

impl PerformanceSummary {
    pub fn from_records<'a, I>(records: I, now: Instant) -> Self
    where
        I: IntoIterator<Item = &'a MetricRecord> + Clone,
    {
        Self {
            generated_at: Utc::now(),
            last_5_minutes: summarize_window(records.clone(), now, LAST_FIVE_MINUTES),
            last_hour: summarize_window(records, now, LAST_HOUR),
        }
    }
}

/// Summarize the records captured within `window` of `now`.
pub fn summarize_window<'a, I>(records: I, now: Instant, window: Duration) -> WindowSummary
where
    I: IntoIterator<Item = &'a MetricRecord>,
{
    let mut summary = WindowSummary::default();
    let mut api = CallAccumulator::default();
    let mut function = CallAccumulator::default();

    for record in records {
        if now.saturating_duration_since(record.recorded_at) > window {
            continue;
        }
        summary.total_metrics += 1;
        match record.metric_type {
            MetricType::Api => api.add(record),
            MetricType::Function => function.add(record),
            MetricType::Navigation => summary.navigation_count += 1,
            MetricType::Resource => summary.resource_count += 1,
            MetricType::LongTask => summary.long_task_count += 1,
            MetricType::Custom(_) => {}
        }
    }

    summary.api = api.finish();
    summary.function = function.finish();
    summary
}

#[derive(Default)]
struct CallAccumulator {
    count: usize,
    success_count: usize,
    total_ms: f64,
    timed: usize,
    latencies: LatencyTracker,
}

impl CallAccumulator {
    fn add(&mut self, record: &MetricRecord) {
        self.count += 1;
        if record.success().unwrap_or(false) {
            self.success_count += 1;
        }
        if let Some(ms) = record.duration_ms() {
            self.total_ms += ms;
            self.timed += 1;
            self.latencies.add_millis(ms);
        }
    }

    fn finish(self) -> CallSummary {
        if self.count == 0 {
            return CallSummary::default();
        }
        CallSummary {
            count: self.count,
            success_count: self.success_count,
            success_rate: Some(self.success_count as f64 / self.count as f64),
            average_duration_ms: (self.timed > 0).then(|| self.total_ms / self.timed as f64),
            p95_duration_ms: self.latencies.summary().p95_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(
        metric_type: MetricType,
        data: serde_json::Value,
        recorded_at: Instant,
    ) -> MetricRecord {
        MetricRecord {
            key: format!("{metric_type}_test"),
            metric_type,
            data,
            timestamp: Utc::now(),
            recorded_at,
            sequence: 0,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn windows_split_by_age() {
        let start = Instant::now();
        let records = vec![
            record(MetricType::Api, json!({"duration_ms": 100.0, "success": true}), start),
            record(
                MetricType::Api,
                json!({"duration_ms": 300.0, "success": false}),
                start + Duration::from_secs(50 * 60),
            ),
            record(
                MetricType::LongTask,
                json!({"duration_ms": 80.0}),
                start + Duration::from_secs(50 * 60),
            ),
        ];
        let now = start + Duration::from_secs(52 * 60);

        let summary = PerformanceSummary::from_records(&records, now);

        assert_eq!(summary.last_5_minutes.total_metrics, 2);
        assert_eq!(summary.last_5_minutes.api.count, 1);
        assert_eq!(summary.last_5_minutes.api.success_rate, Some(0.0));
        assert_eq!(summary.last_5_minutes.long_task_count, 1);

        assert_eq!(summary.last_hour.api.count, 2);
        assert_eq!(summary.last_hour.api.success_rate, Some(0.5));
        assert_eq!(summary.last_hour.api.average_duration_ms, Some(200.0));
        assert!(summary.last_hour.api.p95_duration_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn absurd_durations_still_summarize() {
        let now = Instant::now();
        let records = vec![
            record(MetricType::Api, json!({"duration_ms": 1e25, "success": true}), now),
            record(MetricType::Api, json!({"duration_ms": 40.0, "success": true}), now),
        ];

        let summary = PerformanceSummary::from_records(&records, now);

        assert_eq!(summary.last_5_minutes.api.count, 2);
        assert_eq!(summary.last_5_minutes.api.success_rate, Some(1.0));
        assert!(summary.last_5_minutes.api.p95_duration_ms.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_window_has_no_rates() {
        let summary = summarize_window(std::iter::empty(), Instant::now(), LAST_HOUR);
        assert_eq!(summary.api, CallSummary::default());
        assert_eq!(summary.function.success_rate, None);
    }
}
