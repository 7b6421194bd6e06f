#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use clutch_runtime::config;
use clutch_runtime::logging;
use clutch_runtime::metrics::RuntimeMetrics;
use clutch_runtime::performance::{PerformanceBudget, PerformanceMonitor};
use clutch_runtime::rate_limit::RateLimiters;
use futures_util::future::join_all;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

/// Clutch runtime -- request admission, session keep-alive and performance sampling
#[derive(Parser, Debug)]
#[command(name = "clutch-runtime")]
#[command(about = "Client-side runtime services for the Clutch employee dashboard")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,

    /// Push this many simulated requests through a bucket and report what
    /// the limiter and monitor saw.
    #[arg(long, value_name = "N")]
    burst: Option<u32>,

    /// Bucket used by --burst.
    #[arg(long, default_value = "general", requires = "burst")]
    bucket: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cfg = Arc::new(config::load());

    if cli.print_config {
        let json = serde_json::to_string_pretty(&*cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                for (name, bucket) in cfg.rate_limits.buckets() {
                    println!(
                        "  Bucket {name}: {} requests / {} ms, {} concurrent",
                        bucket.max_requests, bucket.window_ms, bucket.max_concurrent_requests
                    );
                }
                println!(
                    "  Session refresh: every {} s, timeout after {} s",
                    cfg.session.refresh_interval_secs, cfg.session.session_timeout_secs
                );
                println!("  Auth API: {}", cfg.session.api_base_url);
                println!(
                    "  Metrics retention: {} samples, {} s",
                    cfg.performance.max_metrics_count, cfg.performance.max_metrics_age_secs
                );
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    let _log_guard = logging::init_with_config(&cfg.logging);

    let Some(count) = cli.burst else {
        tracing::info!("Nothing to do; pass --burst <N> to exercise a bucket");
        return Ok(());
    };

    let metrics = Arc::new(RuntimeMetrics::new());
    let limiters = RateLimiters::from_config(&cfg.rate_limits, Arc::clone(&metrics));
    let limiter = limiters
        .get(&cli.bucket)
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("unknown bucket '{}'", cli.bucket))?;
    let budget = Arc::new(PerformanceBudget::from_config(
        &cfg.performance,
        Some(Arc::clone(&metrics)),
    ));
    let monitor = Arc::new(PerformanceMonitor::new(
        cfg.performance.clone(),
        Some(budget),
        Arc::clone(&metrics),
    ));

    tracing::info!(bucket = %cli.bucket, count, "Starting burst");
    let calls = (0..count).map(|i| {
        let limiter = Arc::clone(&limiter);
        let monitor = Arc::clone(&monitor);
        tokio::spawn(async move {
            let endpoint = format!("/burst/{i}");
            monitor
                .measure_api_call(
                    &endpoint,
                    limiter.make_request(|| async {
                        tokio::time::sleep(Duration::from_millis(fastrand::u64(5..50))).await;
                        Ok::<_, Infallible>(())
                    }),
                )
                .await
        })
    });
    for joined in join_all(calls).await {
        if let Err(error) = joined {
            tracing::warn!(%error, "Burst task failed");
        }
    }

    let report = serde_json::json!({
        "limiter": limiter.stats(),
        "summary": monitor.get_performance_summary(),
        "metrics": metrics.snapshot(),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
