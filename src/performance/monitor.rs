use super::budget::{PerformanceBudget, API_CALL, FUNCTION_EXECUTION, PAGE_LOAD};
use super::observer::{EntryType, PerformanceEntry, PerformanceEntrySource};
use super::summary::PerformanceSummary;
use super::{MetricRecord, MetricType};
use crate::config::PerformanceConfig;
use crate::metrics::RuntimeMetrics;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::json;
use std::cmp::Reverse;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

const KEY_SUFFIX_LEN: usize = 9;
const MIN_SWEEP_PERIOD: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepOutcome {
    pub evicted_by_age: usize,
    pub evicted_by_count: usize,
}

/// Bounded store of timing samples.
///
/// Samples older than `max_metrics_age` are dropped by [`sweep`](Self::sweep),
/// which then trims the oldest survivors down to `max_metrics_count`. The
/// sweep runs on a timer once [`start`](Self::start) has been called.
pub struct PerformanceMonitor {
    config: PerformanceConfig,
    records: DashMap<String, MetricRecord>,
    sequence: AtomicU64,
    budget: Option<Arc<PerformanceBudget>>,
    metrics: Arc<RuntimeMetrics>,
    running: Mutex<Option<CancellationToken>>,
}

impl PerformanceMonitor {
    pub fn new(
        config: PerformanceConfig,
        budget: Option<Arc<PerformanceBudget>>,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            config,
            records: DashMap::new(),
            sequence: AtomicU64::new(0),
            budget,
            metrics,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &PerformanceConfig {
        &self.config
    }

    pub fn budget(&self) -> Option<&Arc<PerformanceBudget>> {
        self.budget.as_ref()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Subscribe to the platform's timing entries and start the sweep timer.
    ///
    /// Entry types the source cannot observe are logged and skipped. Returns
    /// the number of observers registered. Calling `start` on a running
    /// monitor does nothing.
    pub fn start(self: &Arc<Self>, source: &dyn PerformanceEntrySource) -> usize {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            tracing::debug!("Performance monitor already running");
            return 0;
        }

        let cancel = CancellationToken::new();
        let mut registered = 0;
        for entry_type in EntryType::OBSERVED {
            match source.observe(entry_type) {
                Ok(receiver) => {
                    self.spawn_observer(entry_type, receiver, cancel.child_token());
                    registered += 1;
                }
                Err(error) => {
                    self.metrics.increment_observer_registration_failures();
                    tracing::warn!(
                        entry_type = entry_type.as_str(),
                        %error,
                        "Performance observer not available"
                    );
                }
            }
        }
        self.spawn_sweeper(cancel.child_token());
        *running = Some(cancel);

        tracing::info!(
            observers = registered,
            sweep_interval_secs = self.config.sweep_interval_secs,
            "Performance monitor started"
        );
        registered
    }

    /// Stop observers and the sweep timer and drop every stored sample.
    pub fn destroy(&self) {
        let cancel = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel.cancel();
            tracing::info!("Performance monitor stopped");
        }
        self.records.clear();
    }

    /// Store `data` under a fresh key and return the key.
    pub fn record_metric(
        &self,
        metric_type: impl Into<MetricType>,
        data: serde_json::Value,
    ) -> String {
        let metric_type = metric_type.into();
        let timestamp = Utc::now();
        let suffix: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(KEY_SUFFIX_LEN)
            .collect();
        let key = format!("{metric_type}_{}_{suffix}", timestamp.timestamp_millis());

        let record = MetricRecord {
            key: key.clone(),
            metric_type,
            data,
            timestamp,
            recorded_at: Instant::now(),
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
        };
        tracing::trace!(key = %key, "Recorded performance metric");
        self.records.insert(key.clone(), record);
        self.metrics.increment_metrics_recorded();
        key
    }

    pub fn get_metric(&self, key: &str) -> Option<MetricRecord> {
        self.records.get(key).map(|entry| entry.value().clone())
    }

    /// Stored samples, newest first, optionally of one type. `limit`
    /// defaults to the configured page size.
    pub fn get_metrics(
        &self,
        metric_type: Option<&MetricType>,
        limit: Option<usize>,
    ) -> Vec<MetricRecord> {
        let mut records: Vec<MetricRecord> = self
            .records
            .iter()
            .filter(|entry| metric_type.is_none_or(|ty| &entry.value().metric_type == ty))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_unstable_by_key(|record| Reverse(record.age_order()));
        records.truncate(limit.unwrap_or(self.config.default_limit));
        records
    }

    /// Time `operation` and record it as a function sample.
    pub async fn measure_function<T, E, Fut>(&self, name: &str, operation: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.measure(MetricType::Function, "name", name, FUNCTION_EXECUTION, operation)
            .await
    }

    /// Time `operation` and record it as an API call sample.
    pub async fn measure_api_call<T, E, Fut>(&self, endpoint: &str, operation: Fut) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        self.measure(MetricType::Api, "endpoint", endpoint, API_CALL, operation)
            .await
    }

    async fn measure<T, E, Fut>(
        &self,
        metric_type: MetricType,
        label_field: &str,
        label: &str,
        budget_type: &str,
        operation: Fut,
    ) -> Result<T, E>
    where
        E: Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let started = Instant::now();
        let result = operation.await;
        let elapsed = started.elapsed();
        let duration_ms = elapsed.as_micros() as f64 / 1000.0;

        let mut data = serde_json::Map::new();
        data.insert(label_field.to_string(), json!(label));
        data.insert("duration_ms".to_string(), json!(duration_ms));
        data.insert("success".to_string(), json!(result.is_ok()));
        if let Err(error) = &result {
            data.insert("error".to_string(), json!(error.to_string()));
        }
        self.record_metric(metric_type, serde_json::Value::Object(data));

        if let Some(budget) = &self.budget {
            budget.check_budget(budget_type, elapsed);
        }
        result
    }

    /// Store a platform timing entry.
    pub fn record_entry(&self, entry: PerformanceEntry) -> String {
        if entry.entry_type == EntryType::Navigation {
            let duration = Duration::try_from_secs_f64(entry.duration_ms / 1000.0);
            if let (Some(budget), Ok(duration)) = (&self.budget, duration) {
                budget.check_budget(PAGE_LOAD, duration);
            }
        }
        let data = json!({
            "name": entry.name,
            "duration_ms": entry.duration_ms,
            "start_time_ms": entry.start_time_ms,
            "detail": entry.detail,
        });
        self.record_metric(entry.entry_type, data)
    }

    /// Evict by age, then by count, oldest first.
    pub fn sweep(&self) -> SweepOutcome {
        let now = Instant::now();
        let max_age = self.config.max_metrics_age();

        let before = self.records.len();
        self.records
            .retain(|_, record| now.saturating_duration_since(record.recorded_at) <= max_age);
        let evicted_by_age = before.saturating_sub(self.records.len());

        let mut evicted_by_count = 0;
        let excess = self.records.len().saturating_sub(self.config.max_metrics_count);
        if excess > 0 {
            let mut by_age: Vec<((Instant, u64), String)> = self
                .records
                .iter()
                .map(|entry| (entry.value().age_order(), entry.key().clone()))
                .collect();
            by_age.sort_unstable_by_key(|(order, _)| *order);
            for (_, key) in by_age.into_iter().take(excess) {
                if self.records.remove(&key).is_some() {
                    evicted_by_count += 1;
                }
            }
        }

        self.metrics.increment_sweeps();
        self.metrics.add_metrics_evicted_by_age(evicted_by_age as u64);
        self.metrics.add_metrics_evicted_by_count(evicted_by_count as u64);
        if evicted_by_age + evicted_by_count > 0 {
            tracing::debug!(
                evicted_by_age,
                evicted_by_count,
                remaining = self.records.len(),
                "Performance metrics swept"
            );
        }

        SweepOutcome {
            evicted_by_age,
            evicted_by_count,
        }
    }

    pub fn get_performance_summary(&self) -> PerformanceSummary {
        let records: Vec<MetricRecord> = self
            .records
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        PerformanceSummary::from_records(&records, Instant::now())
    }

    fn spawn_observer(
        self: &Arc<Self>,
        entry_type: EntryType,
        mut receiver: broadcast::Receiver<PerformanceEntry>,
        cancel: CancellationToken,
    ) {
        let monitor: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            loop {
                let entry = tokio::select! {
                    _ = cancel.cancelled() => break,
                    entry = receiver.recv() => entry,
                };
                match entry {
                    Ok(entry) => {
                        let Some(monitor) = monitor.upgrade() else { break };
                        monitor.record_entry(entry);
                    }
                    Err(RecvError::Lagged(missed)) => {
                        tracing::debug!(
                            entry_type = entry_type.as_str(),
                            missed,
                            "Performance observer lagged"
                        );
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    fn spawn_sweeper(self: &Arc<Self>, cancel: CancellationToken) {
        let monitor: Weak<Self> = Arc::downgrade(self);
        let period = self.config.sweep_interval().max(MIN_SWEEP_PERIOD);
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        let Some(monitor) = monitor.upgrade() else { break };
                        monitor.sweep();
                    }
                }
            }
        });
    }
}

impl Drop for PerformanceMonitor {
    fn drop(&mut self) {
        if let Some(cancel) = self
            .running
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            cancel.cancel();
        }
    }
}
