//! Client-side admission control.
//!
//! A [`RateLimiter`] gates one logical bucket of outbound calls: at most
//! `max_requests` may start within any trailing window, and at most
//! `max_concurrent_requests` may be in flight. Contention is answered with a
//! delay, never an error.

pub mod batch;
pub mod buckets;

pub use batch::batch_requests;
pub use buckets::RateLimiters;

use crate::config::defaults::{CONCURRENCY_RETRY_DELAY_MS, LONG_WAIT_LOG_THRESHOLD_MS};
use crate::config::BucketConfig;
use crate::metrics::RuntimeMetrics;
use serde::Serialize;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::time::{sleep, Duration, Instant};

/// Delay handed out while the bucket is blocked only on concurrency.
pub const CONCURRENCY_RETRY_DELAY: Duration = Duration::from_millis(CONCURRENCY_RETRY_DELAY_MS);

const LONG_WAIT_LOG_THRESHOLD: Duration = Duration::from_millis(LONG_WAIT_LOG_THRESHOLD_MS);

/// Sliding-window plus concurrency limiter for a single bucket.
pub struct RateLimiter {
    name: Arc<str>,
    config: BucketConfig,
    state: Mutex<LimiterState>,
    metrics: Option<Arc<RuntimeMetrics>>,
}

#[derive(Debug, Default)]
struct LimiterState {
    /// Admission timestamps, oldest first
    requests: VecDeque<Instant>,
    /// Admitted but not yet completed
    pending: u32,
}

impl LimiterState {
    /// Drop timestamps that are no longer inside `(now - window, now]`.
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(&front) = self.requests.front() {
            if now.duration_since(front) >= window {
                self.requests.pop_front();
            } else {
                break;
            }
        }
    }

    fn admissible(&self, config: &BucketConfig) -> bool {
        self.requests.len() < config.max_requests as usize
            && self.pending < config.max_concurrent_requests
    }

    fn record(&mut self, now: Instant) {
        self.requests.push_back(now);
        self.pending = self.pending.saturating_add(1);
    }

    /// Time until admission may succeed; state must already be pruned.
    fn delay(&self, config: &BucketConfig, now: Instant) -> Duration {
        if self.admissible(config) {
            return Duration::ZERO;
        }
        if self.pending >= config.max_concurrent_requests {
            return CONCURRENCY_RETRY_DELAY;
        }
        match self.requests.front() {
            Some(&oldest) => (oldest + config.window()).saturating_duration_since(now),
            // Only reachable with max_requests == 0, which never admits.
            None => config.window(),
        }
    }
}

/// Point-in-time view of a bucket.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RateLimiterStats {
    pub name: String,
    pub requests_in_window: usize,
    pub pending_requests: u32,
    pub max_requests: u32,
    pub window_ms: u64,
    pub max_concurrent_requests: u32,
}

impl RateLimiter {
    pub fn new(name: impl Into<Arc<str>>, config: BucketConfig) -> Self {
        Self {
            name: name.into(),
            config,
            state: Mutex::new(LimiterState::default()),
            metrics: None,
        }
    }

    pub fn with_metrics(
        name: impl Into<Arc<str>>,
        config: BucketConfig,
        metrics: Arc<RuntimeMetrics>,
    ) -> Self {
        Self {
            metrics: Some(metrics),
            ..Self::new(name, config)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &BucketConfig {
        &self.config
    }

    // The state is a plain counter plus a deque; a panic mid-update cannot
    // leave it inconsistent enough to justify refusing all future requests.
    fn lock_state(&self) -> MutexGuard<'_, LimiterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether a request could be admitted right now. Prunes stale timestamps.
    pub fn can_make_request(&self) -> bool {
        let mut state = self.lock_state();
        state.prune(Instant::now(), self.config.window());
        state.admissible(&self.config)
    }

    /// Count a request as started and in flight. Does not check admission.
    pub fn record_request(&self) {
        self.lock_state().record(Instant::now());
    }

    /// Mark one in-flight request as finished. Extra calls are ignored.
    pub fn complete_request(&self) {
        let mut state = self.lock_state();
        state.pending = state.pending.saturating_sub(1);
    }

    /// How long a caller should wait before trying again.
    ///
    /// Zero when admissible. A fixed [`CONCURRENCY_RETRY_DELAY`] when every
    /// concurrency slot is taken. Otherwise the exact time until the oldest
    /// counted request leaves the window, which is never longer than the window.
    pub fn get_delay(&self) -> Duration {
        let now = Instant::now();
        let mut state = self.lock_state();
        state.prune(now, self.config.window());
        state.delay(&self.config, now)
    }

    /// Sleep for [`get_delay`](Self::get_delay).
    ///
    /// This only waits; it does not reserve the slot. Use
    /// [`make_request`](Self::make_request) for an atomic wait-and-admit.
    pub async fn wait_for_slot(&self) {
        let delay = self.get_delay();
        if delay.is_zero() {
            return;
        }
        self.note_wait(delay);
        sleep(delay).await;
    }

    /// Run `operation` once the bucket admits it.
    ///
    /// The in-flight counter is released when the operation finishes, fails,
    /// or the returned future is dropped part way through.
    pub async fn make_request<T, E, F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.acquire_slot().await;
        let _slot = SlotGuard { limiter: self };

        let result = operation().await;
        if result.is_err() {
            if let Some(metrics) = &self.metrics {
                metrics.increment_request_failures();
            }
        }
        result
    }

    /// Forget all history and in-flight accounting.
    pub fn reset(&self) {
        let mut state = self.lock_state();
        state.requests.clear();
        state.pending = 0;
        drop(state);

        if let Some(metrics) = &self.metrics {
            metrics.increment_limiter_resets();
        }
        tracing::debug!(bucket = %self.name, "Rate limiter reset");
    }

    pub fn stats(&self) -> RateLimiterStats {
        let mut state = self.lock_state();
        state.prune(Instant::now(), self.config.window());
        RateLimiterStats {
            name: self.name.to_string(),
            requests_in_window: state.requests.len(),
            pending_requests: state.pending,
            max_requests: self.config.max_requests,
            window_ms: self.config.window_ms,
            max_concurrent_requests: self.config.max_concurrent_requests,
        }
    }

    pub fn pending_requests(&self) -> u32 {
        self.lock_state().pending
    }

    /// Check and record under one lock hold, sleeping between attempts.
    async fn acquire_slot(&self) {
        let mut delayed = false;
        loop {
            let delay = {
                let now = Instant::now();
                let mut state = self.lock_state();
                state.prune(now, self.config.window());
                if state.admissible(&self.config) {
                    state.record(now);
                    break;
                }
                state.delay(&self.config, now)
            };

            delayed = true;
            self.note_wait(delay);
            sleep(delay).await;
        }

        if let Some(metrics) = &self.metrics {
            metrics.increment_requests_admitted();
            if delayed {
                metrics.increment_requests_delayed();
            }
        }
    }

    fn note_wait(&self, delay: Duration) {
        if delay > LONG_WAIT_LOG_THRESHOLD {
            if let Some(metrics) = &self.metrics {
                metrics.increment_long_waits();
            }
            tracing::info!(
                bucket = %self.name,
                delay_ms = delay.as_millis() as u64,
                "Rate limit reached, waiting for a free slot"
            );
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct SlotGuard<'a> {
    limiter: &'a RateLimiter,
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        self.limiter.complete_request();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn limiter(max_requests: u32, window_ms: u64, max_concurrent: u32) -> RateLimiter {
        RateLimiter::new(
            "test",
            BucketConfig::new(max_requests, window_ms, max_concurrent),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn window_saturation_blocks_until_oldest_expires() {
        let limiter = limiter(2, 1000, 10);

        limiter.record_request();
        limiter.complete_request();
        limiter.record_request();
        limiter.complete_request();
        assert!(!limiter.can_make_request());

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(!limiter.can_make_request());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(limiter.can_make_request());
    }

    #[tokio::test(start_paused = true)]
    async fn concurrency_block_uses_fixed_retry_delay() {
        let limiter = limiter(10, 1000, 1);
        limiter.record_request();

        assert!(!limiter.can_make_request());
        assert_eq!(limiter.get_delay(), CONCURRENCY_RETRY_DELAY);

        limiter.complete_request();
        assert_eq!(limiter.get_delay(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn window_delay_is_exact_time_until_oldest_leaves() {
        let limiter = limiter(2, 1000, 10);
        limiter.record_request();
        limiter.complete_request();
        tokio::time::advance(Duration::from_millis(300)).await;
        limiter.record_request();
        limiter.complete_request();

        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(limiter.get_delay(), Duration::from_millis(600));
    }

    #[tokio::test(start_paused = true)]
    async fn delay_is_zero_iff_admissible_and_bounded_by_window() {
        let limiter = limiter(3, 1000, 2);
        for step in 0..20u64 {
            if step % 3 == 0 {
                limiter.record_request();
            }
            if step % 4 == 0 {
                limiter.complete_request();
            }

            let admissible = limiter.can_make_request();
            let delay = limiter.get_delay();
            if admissible {
                assert_eq!(delay, Duration::ZERO);
            } else {
                assert!(delay > Duration::ZERO);
                assert!(delay <= Duration::from_millis(1000));
            }
            tokio::time::advance(Duration::from_millis(137)).await;
        }
    }

    #[test]
    fn complete_request_floors_at_zero() {
        let limiter = limiter(5, 1000, 5);
        limiter.complete_request();
        limiter.complete_request();
        assert_eq!(limiter.pending_requests(), 0);

        limiter.record_request();
        limiter.complete_request();
        limiter.complete_request();
        assert_eq!(limiter.pending_requests(), 0);
    }

    #[tokio::test]
    async fn make_request_balances_pending_on_error() {
        let limiter = limiter(5, 1000, 5);
        let before = limiter.pending_requests();

        let result: Result<(), String> = limiter
            .make_request(|| async { Err("boom".to_string()) })
            .await;

        assert_eq!(result.unwrap_err(), "boom");
        assert_eq!(limiter.pending_requests(), before);
    }

    #[tokio::test]
    async fn make_request_returns_operation_value() {
        let limiter = limiter(5, 1000, 5);
        let calls = AtomicU32::new(0);

        let value = limiter
            .make_request(|| async {
                calls.fetch_add(1, Ordering::Relaxed);
                Ok::<_, std::convert::Infallible>(41 + 1)
            })
            .await
            .unwrap();

        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert_eq!(limiter.stats().requests_in_window, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_request_future_releases_slot() {
        let limiter = limiter(5, 1000, 1);

        let pending = limiter.make_request(|| async {
            sleep(Duration::from_secs(60)).await;
            Ok::<_, ()>(())
        });
        let timed_out = tokio::time::timeout(Duration::from_millis(10), pending).await;

        assert!(timed_out.is_err());
        assert_eq!(limiter.pending_requests(), 0);
        assert!(limiter.can_make_request());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_slot_sleeps_for_computed_delay() {
        let limiter = limiter(1, 1000, 5);
        limiter.record_request();
        limiter.complete_request();

        let started = Instant::now();
        limiter.wait_for_slot().await;
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(1000), "waited {waited:?}");
        assert!(waited < Duration::from_millis(1100), "waited {waited:?}");
        assert!(limiter.can_make_request());
    }

    #[test]
    fn reset_clears_history_and_pending() {
        let metrics = Arc::new(RuntimeMetrics::new());
        let limiter = RateLimiter::with_metrics(
            "reset",
            BucketConfig::new(1, 60_000, 1),
            Arc::clone(&metrics),
        );
        limiter.record_request();
        assert!(!limiter.can_make_request());

        limiter.reset();

        assert!(limiter.can_make_request());
        assert_eq!(limiter.pending_requests(), 0);
        assert_eq!(metrics.snapshot().rate_limiting.resets, 1);
    }

    #[test]
    fn zero_request_bucket_never_admits() {
        let limiter = limiter(0, 1000, 5);
        assert!(!limiter.can_make_request());
        assert_eq!(limiter.get_delay(), Duration::from_millis(1000));
    }
}
