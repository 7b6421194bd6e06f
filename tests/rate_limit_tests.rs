use clutch_runtime::config::BucketConfig;
use clutch_runtime::metrics::RuntimeMetrics;
use clutch_runtime::rate_limit::{batch_requests, RateLimiter};
use proptest::prelude::*;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{sleep, Duration, Instant};

/// Spawn `calls` requests at once, each holding its slot for `hold`, and
/// return the offset from start at which each was admitted.
async fn admission_offsets(
    limiter: Arc<RateLimiter>,
    calls: usize,
    hold: Duration,
) -> Vec<Duration> {
    let start = Instant::now();
    let admitted = Arc::new(Mutex::new(Vec::new()));

    let handles: Vec<_> = (0..calls)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            let admitted = Arc::clone(&admitted);
            tokio::spawn(async move {
                limiter
                    .make_request(|| async {
                        admitted.lock().unwrap().push(start.elapsed());
                        sleep(hold).await;
                        Ok::<_, Infallible>(())
                    })
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let mut offsets = admitted.lock().unwrap().clone();
    offsets.sort();
    offsets
}

#[tokio::test(start_paused = true)]
async fn five_fast_calls_through_a_two_per_second_bucket() {
    let limiter = Arc::new(RateLimiter::new("demo", BucketConfig::new(2, 1000, 2)));

    let offsets = admission_offsets(Arc::clone(&limiter), 5, Duration::from_millis(50)).await;

    assert_eq!(offsets.len(), 5);
    assert!(offsets[0] < Duration::from_millis(10));
    assert!(offsets[1] < Duration::from_millis(10));
    for late in &offsets[2..] {
        assert!(*late >= Duration::from_millis(1000), "admitted too early: {late:?}");
    }
    // No more than two admissions inside any one-second window.
    for (i, &t) in offsets.iter().enumerate() {
        let in_window = offsets[i..]
            .iter()
            .filter(|&&u| u < t + Duration::from_millis(1000))
            .count();
        assert!(in_window <= 2, "window starting {t:?} admitted {in_window}");
    }
    assert_eq!(limiter.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn fourth_and_fifth_calls_wait_for_the_window() {
    let limiter = Arc::new(RateLimiter::new("e2e", BucketConfig::new(3, 1000, 2)));

    let offsets = admission_offsets(Arc::clone(&limiter), 5, Duration::from_millis(50)).await;

    assert_eq!(offsets.len(), 5);
    assert!(offsets[2] < Duration::from_millis(1000), "third call: {:?}", offsets[2]);
    assert!(offsets[3] >= Duration::from_millis(1000), "fourth call: {:?}", offsets[3]);
    assert!(offsets[4] >= Duration::from_millis(1000), "fifth call: {:?}", offsets[4]);
    assert_eq!(limiter.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrency_cap_holds_under_load() {
    let limiter = Arc::new(RateLimiter::new("cap", BucketConfig::new(1000, 60_000, 3)));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..20)
        .map(|i| {
            let limiter = Arc::clone(&limiter);
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            tokio::spawn(async move {
                limiter
                    .make_request(|| async move {
                        let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        sleep(Duration::from_millis(20 + (i % 4) * 15)).await;
                        in_flight.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, Infallible>(())
                    })
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(peak.load(Ordering::SeqCst), 3);
    assert_eq!(limiter.pending_requests(), 0);
    assert_eq!(limiter.stats().requests_in_window, 20);
}

#[tokio::test(start_paused = true)]
async fn waiting_request_stays_pending_until_slot_frees() {
    let limiter = RateLimiter::new("pending", BucketConfig::new(1, 500, 1));
    limiter.record_request();
    limiter.complete_request();

    let mut waiting = tokio_test::task::spawn(limiter.make_request(|| async { Ok::<_, ()>(7) }));
    tokio_test::assert_pending!(waiting.poll());

    sleep(Duration::from_millis(501)).await;
    assert!(waiting.is_woken());
    tokio_test::assert_ready_eq!(waiting.poll(), Ok(7));
}

#[tokio::test(start_paused = true)]
async fn dropped_request_releases_its_slot() {
    let limiter = Arc::new(RateLimiter::new("cancel", BucketConfig::new(10, 1000, 1)));

    let holder = {
        let limiter = Arc::clone(&limiter);
        tokio::spawn(async move {
            limiter
                .make_request(|| async {
                    sleep(Duration::from_secs(60)).await;
                    Ok::<_, Infallible>(())
                })
                .await
        })
    };
    sleep(Duration::from_millis(10)).await;
    assert_eq!(limiter.pending_requests(), 1);

    holder.abort();
    let _ = holder.await;
    assert_eq!(limiter.pending_requests(), 0);
    assert!(limiter.can_make_request());
}

#[tokio::test(start_paused = true)]
async fn batch_keeps_going_after_failures_and_counts_them() {
    let metrics = Arc::new(RuntimeMetrics::new());
    let limiter =
        RateLimiter::with_metrics("batch", BucketConfig::new(2, 1000, 2), metrics.clone());

    let started = Instant::now();
    let results = batch_requests(
        &limiter,
        ["employees", "payroll", "leave"].map(|endpoint| move || async move {
            if endpoint == "payroll" {
                Err(format!("{endpoint}: 503"))
            } else {
                Ok(endpoint.len())
            }
        }),
    )
    .await;

    assert_eq!(results, vec![Ok(9), Err("payroll: 503".to_string()), Ok(5)]);
    // Third call waits for the window.
    assert!(started.elapsed() >= Duration::from_millis(1000));
    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.rate_limiting.requests_admitted, 3);
    assert_eq!(snapshot.rate_limiting.request_failures, 1);
    assert_eq!(snapshot.rate_limiting.requests_delayed, 1);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn admissions_never_exceed_bucket_limits(
        max_requests in 1u32..5,
        window_ms in 50u64..400,
        max_concurrent in 1u32..4,
        calls in 1usize..16,
        hold_ms in 0u64..120,
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();

        let (offsets, peak) = rt.block_on(async move {
            let limiter = Arc::new(RateLimiter::new(
                "prop",
                BucketConfig::new(max_requests, window_ms, max_concurrent),
            ));
            let in_flight = Arc::new(AtomicUsize::new(0));
            let peak = Arc::new(AtomicUsize::new(0));
            let start = Instant::now();
            let admitted = Arc::new(Mutex::new(Vec::new()));

            let handles: Vec<_> = (0..calls)
                .map(|_| {
                    let limiter = Arc::clone(&limiter);
                    let in_flight = Arc::clone(&in_flight);
                    let peak = Arc::clone(&peak);
                    let admitted = Arc::clone(&admitted);
                    tokio::spawn(async move {
                        limiter
                            .make_request(|| async move {
                                admitted.lock().unwrap().push(start.elapsed());
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                sleep(Duration::from_millis(hold_ms)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, Infallible>(())
                            })
                            .await
                    })
                })
                .collect();
            for handle in handles {
                handle.await.unwrap().unwrap();
            }

            let mut offsets = admitted.lock().unwrap().clone();
            offsets.sort();
            (offsets, peak.load(Ordering::SeqCst))
        });

        prop_assert_eq!(offsets.len(), calls);
        prop_assert!(peak <= max_concurrent as usize);
        let window = Duration::from_millis(window_ms);
        for (i, &t) in offsets.iter().enumerate() {
            let in_window = offsets[i..].iter().filter(|&&u| u < t + window).count();
            prop_assert!(in_window <= max_requests as usize);
        }
    }
}
