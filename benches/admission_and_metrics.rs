use clutch_runtime::config::{BucketConfig, PerformanceConfig};
use clutch_runtime::metrics::{LatencyTracker, RuntimeMetrics};
use clutch_runtime::performance::{MetricType, PerformanceMonitor};
use clutch_runtime::rate_limit::RateLimiter;
use criterion::{criterion_group, criterion_main, Criterion};
use serde_json::json;
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

fn bench_admission(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _guard = rt.enter();

    c.bench_function("rate_limiter_check_record_complete", |b| {
        let limiter = RateLimiter::new("bench", BucketConfig::new(u32::MAX, 60_000, 64));
        b.iter(|| {
            if limiter.can_make_request() {
                limiter.record_request();
                limiter.complete_request();
            }
        });
    });

    c.bench_function("rate_limiter_get_delay_saturated", |b| {
        let limiter = RateLimiter::new("bench", BucketConfig::new(512, 60_000, 1024));
        for _ in 0..512 {
            limiter.record_request();
        }
        b.iter(|| black_box(limiter.get_delay()));
    });
}

fn bench_metrics(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let _guard = rt.enter();

    c.bench_function("performance_monitor_record_and_sweep", |b| {
        let monitor = PerformanceMonitor::new(
            PerformanceConfig::default(),
            None,
            Arc::new(RuntimeMetrics::new()),
        );
        b.iter(|| {
            for i in 0..1100 {
                monitor.record_metric(MetricType::Api, json!({ "duration_ms": i }));
            }
            black_box(monitor.sweep())
        });
    });

    c.bench_function("latency_tracker_summary", |b| {
        let mut tracker = LatencyTracker::new();
        for sample in 0..5000u64 {
            tracker.add_sample(Duration::from_micros(300 + (sample % 200)));
        }
        b.iter(|| black_box(tracker.summary()));
    });
}

criterion_group!(admission_and_metrics, bench_admission, bench_metrics);
criterion_main!(admission_and_metrics);
