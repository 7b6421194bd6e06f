use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Operational counters shared by the rate limiters, the session manager and
/// the performance monitor.
#[derive(Debug, Default)]
pub struct RuntimeMetrics {
    // Rate limiting
    pub requests_admitted: AtomicU64,
    pub requests_delayed: AtomicU64,
    pub long_waits: AtomicU64,
    pub request_failures: AtomicU64,
    pub limiter_resets: AtomicU64,

    // Session refresh
    pub refresh_attempts: AtomicU64,
    pub refresh_successes: AtomicU64,
    pub refresh_failures: AtomicU64,
    pub stale_refreshes_discarded: AtomicU64,
    pub validations: AtomicU64,
    pub validation_failures: AtomicU64,
    pub session_extensions: AtomicU64,
    pub guard_skips: AtomicU64,

    // Session timers
    pub refresh_timers_created: AtomicU64,
    pub refresh_timers_cleared: AtomicU64,
    pub timeout_timers_created: AtomicU64,
    pub timeout_timers_cleared: AtomicU64,

    // Session teardowns, by reason
    pub teardowns_logout: AtomicU64,
    pub teardowns_timeout: AtomicU64,
    pub teardowns_refresh_failed: AtomicU64,
    pub teardowns_validation_failed: AtomicU64,

    // Performance monitor
    pub metrics_recorded: AtomicU64,
    pub metrics_evicted_by_age: AtomicU64,
    pub metrics_evicted_by_count: AtomicU64,
    pub sweeps: AtomicU64,
    pub budget_violations: AtomicU64,
    pub observer_registration_failures: AtomicU64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub rate_limiting: RateLimitingMetrics,
    pub session: SessionMetrics,
    pub performance: MonitorMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RateLimitingMetrics {
    pub requests_admitted: u64,
    pub requests_delayed: u64,
    pub long_waits: u64,
    pub request_failures: u64,
    pub resets: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionMetrics {
    pub refresh_attempts: u64,
    pub refresh_successes: u64,
    pub refresh_failures: u64,
    pub stale_refreshes_discarded: u64,
    pub validations: u64,
    pub validation_failures: u64,
    pub session_extensions: u64,
    pub guard_skips: u64,
    pub active_refresh_timers: u64,
    pub active_timeout_timers: u64,
    pub teardowns: TeardownMetrics,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
pub struct TeardownMetrics {
    pub logout: u64,
    pub timeout: u64,
    pub refresh_failed: u64,
    pub validation_failed: u64,
}

impl TeardownMetrics {
    pub fn total(&self) -> u64 {
        self.logout + self.timeout + self.refresh_failed + self.validation_failed
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct MonitorMetrics {
    pub metrics_recorded: u64,
    pub evicted_by_age: u64,
    pub evicted_by_count: u64,
    pub sweeps: u64,
    pub budget_violations: u64,
    pub observer_registration_failures: u64,
}

fn load(counter: &AtomicU64) -> u64 {
    counter.load(Ordering::Relaxed)
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl RuntimeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    // Rate limiting
    pub fn increment_requests_admitted(&self) {
        bump(&self.requests_admitted);
    }

    pub fn increment_requests_delayed(&self) {
        bump(&self.requests_delayed);
    }

    pub fn increment_long_waits(&self) {
        bump(&self.long_waits);
    }

    pub fn increment_request_failures(&self) {
        bump(&self.request_failures);
    }

    pub fn increment_limiter_resets(&self) {
        bump(&self.limiter_resets);
    }

    // Session refresh
    pub fn increment_refresh_attempts(&self) {
        bump(&self.refresh_attempts);
    }

    pub fn increment_refresh_successes(&self) {
        bump(&self.refresh_successes);
    }

    pub fn increment_refresh_failures(&self) {
        bump(&self.refresh_failures);
    }

    pub fn increment_stale_refreshes_discarded(&self) {
        bump(&self.stale_refreshes_discarded);
    }

    pub fn increment_validations(&self) {
        bump(&self.validations);
    }

    pub fn increment_validation_failures(&self) {
        bump(&self.validation_failures);
    }

    pub fn increment_session_extensions(&self) {
        bump(&self.session_extensions);
    }

    pub fn increment_guard_skips(&self) {
        bump(&self.guard_skips);
    }

    // Session timers
    pub fn increment_refresh_timers_created(&self) {
        bump(&self.refresh_timers_created);
    }

    pub fn increment_refresh_timers_cleared(&self) {
        bump(&self.refresh_timers_cleared);
    }

    pub fn increment_timeout_timers_created(&self) {
        bump(&self.timeout_timers_created);
    }

    pub fn increment_timeout_timers_cleared(&self) {
        bump(&self.timeout_timers_cleared);
    }

    /// Refresh intervals created and not yet cleared.
    pub fn active_refresh_timers(&self) -> u64 {
        load(&self.refresh_timers_created).saturating_sub(load(&self.refresh_timers_cleared))
    }

    /// Absolute-timeout timers created and not yet cleared (or fired).
    pub fn active_timeout_timers(&self) -> u64 {
        load(&self.timeout_timers_created).saturating_sub(load(&self.timeout_timers_cleared))
    }

    pub fn increment_teardowns_logout(&self) {
        bump(&self.teardowns_logout);
    }

    pub fn increment_teardowns_timeout(&self) {
        bump(&self.teardowns_timeout);
    }

    pub fn increment_teardowns_refresh_failed(&self) {
        bump(&self.teardowns_refresh_failed);
    }

    pub fn increment_teardowns_validation_failed(&self) {
        bump(&self.teardowns_validation_failed);
    }

    pub fn teardowns(&self) -> TeardownMetrics {
        TeardownMetrics {
            logout: load(&self.teardowns_logout),
            timeout: load(&self.teardowns_timeout),
            refresh_failed: load(&self.teardowns_refresh_failed),
            validation_failed: load(&self.teardowns_validation_failed),
        }
    }

    // Performance monitor
    pub fn increment_metrics_recorded(&self) {
        bump(&self.metrics_recorded);
    }

    pub fn add_metrics_evicted_by_age(&self, count: u64) {
        if count > 0 {
            self.metrics_evicted_by_age
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn add_metrics_evicted_by_count(&self, count: u64) {
        if count > 0 {
            self.metrics_evicted_by_count
                .fetch_add(count, Ordering::Relaxed);
        }
    }

    pub fn increment_sweeps(&self) {
        bump(&self.sweeps);
    }

    pub fn increment_budget_violations(&self) {
        bump(&self.budget_violations);
    }

    pub fn increment_observer_registration_failures(&self) {
        bump(&self.observer_registration_failures);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timestamp: chrono::Utc::now(),
            rate_limiting: RateLimitingMetrics {
                requests_admitted: load(&self.requests_admitted),
                requests_delayed: load(&self.requests_delayed),
                long_waits: load(&self.long_waits),
                request_failures: load(&self.request_failures),
                resets: load(&self.limiter_resets),
            },
            session: SessionMetrics {
                refresh_attempts: load(&self.refresh_attempts),
                refresh_successes: load(&self.refresh_successes),
                refresh_failures: load(&self.refresh_failures),
                stale_refreshes_discarded: load(&self.stale_refreshes_discarded),
                validations: load(&self.validations),
                validation_failures: load(&self.validation_failures),
                session_extensions: load(&self.session_extensions),
                guard_skips: load(&self.guard_skips),
                active_refresh_timers: self.active_refresh_timers(),
                active_timeout_timers: self.active_timeout_timers(),
                teardowns: self.teardowns(),
            },
            performance: MonitorMetrics {
                metrics_recorded: load(&self.metrics_recorded),
                evicted_by_age: load(&self.metrics_evicted_by_age),
                evicted_by_count: load(&self.metrics_evicted_by_count),
                sweeps: load(&self.sweeps),
                budget_violations: load(&self.budget_violations),
                observer_registration_failures: load(&self.observer_registration_failures),
            },
        }
    }
}

const DEFAULT_LOWEST_DISCERNIBLE_MICROS: u64 = 1;
const DEFAULT_HIGHEST_TRACKABLE_MICROS: u64 = 300_000_000; // 5 minutes in microseconds
const DEFAULT_SIGNIFICANT_FIGURES: u8 = 3;
const MICROS_PER_MS: f64 = 1000.0;
const MILLIS_PER_SEC: f64 = 1000.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct LatencySummary {
    pub average_ms: Option<f64>,
    pub p50_ms: Option<f64>,
    pub p95_ms: Option<f64>,
    pub p99_ms: Option<f64>,
    pub max_ms: Option<f64>,
    pub sample_count: u64,
}

/// Latency distribution over a set of samples.
///
/// Samples above five minutes are clamped to the highest trackable value and
/// counted in [`LatencyTracker::clamped_samples`].
#[derive(Debug, Clone)]
pub struct LatencyTracker {
    /// `None` only if every histogram constructor failed
    histogram: Option<Histogram<u64>>,
    clamped: u64,
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl LatencyTracker {
    pub fn new() -> Self {
        let histogram = Histogram::new_with_bounds(
            DEFAULT_LOWEST_DISCERNIBLE_MICROS,
            DEFAULT_HIGHEST_TRACKABLE_MICROS,
            DEFAULT_SIGNIFICANT_FIGURES,
        )
        .or_else(|e| {
            tracing::warn!(
                target: "metrics",
                error = %e,
                "Failed to create bounded histogram, using auto-resizing fallback"
            );
            Histogram::new(2)
        })
        .ok();

        if histogram.is_none() {
            tracing::error!(
                target: "metrics",
                "Latency histogram unavailable; samples will be dropped"
            );
        }

        Self {
            histogram,
            clamped: 0,
        }
    }

    pub fn add_sample(&mut self, duration: Duration) {
        let micros = duration.as_micros().min(u128::from(u64::MAX)) as u64;
        let value = if micros > DEFAULT_HIGHEST_TRACKABLE_MICROS {
            self.clamped += 1;
            DEFAULT_HIGHEST_TRACKABLE_MICROS
        } else {
            micros
        };
        if let Some(histogram) = self.histogram.as_mut() {
            if let Err(error) = histogram.record(value) {
                tracing::warn!(target: "metrics", %error, value, "failed to record latency sample");
            }
        }
    }

    /// Negative and NaN readings are ignored; readings too large for a
    /// `Duration` count as clamped samples.
    pub fn add_millis(&mut self, millis: f64) {
        if millis.is_nan() || millis < 0.0 {
            return;
        }
        match Duration::try_from_secs_f64(millis / MILLIS_PER_SEC) {
            Ok(duration) => self.add_sample(duration),
            Err(_) => self.add_sample(Duration::MAX),
        }
    }

    pub fn clamped_samples(&self) -> u64 {
        self.clamped
    }

    pub fn summary(&self) -> LatencySummary {
        let Some(histogram) = self.histogram.as_ref().filter(|h| !h.is_empty()) else {
            return LatencySummary::default();
        };

        let at = |p: f64| Some(histogram.value_at_percentile(p) as f64 / MICROS_PER_MS);
        LatencySummary {
            average_ms: Some(histogram.mean() / MICROS_PER_MS),
            p50_ms: at(50.0),
            p95_ms: at(95.0),
            p99_ms: at(99.0),
            max_ms: Some(histogram.max() as f64 / MICROS_PER_MS),
            sample_count: histogram.len(),
        }
    }
}
