//! Configuration validation functions.

use super::Config;

/// Reject configurations the runtime cannot honour.
///
/// Each rule maps to an invariant a component relies on: a bucket with a zero
/// window or zero concurrency could never admit anything, and a refresh
/// interval that is not shorter than the absolute timeout would let the
/// session expire before its first refresh.
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    for (name, bucket) in config.rate_limits.buckets() {
        if bucket.window_ms == 0 {
            anyhow::bail!("rate_limits.{name}.window_ms must be greater than zero");
        }
        if bucket.max_requests == 0 {
            anyhow::bail!("rate_limits.{name}.max_requests must be greater than zero");
        }
        if bucket.max_concurrent_requests == 0 {
            anyhow::bail!("rate_limits.{name}.max_concurrent_requests must be greater than zero");
        }
    }

    let session = &config.session;
    if session.refresh_interval_secs == 0 {
        anyhow::bail!("session.refresh_interval_secs must be greater than zero");
    }
    if session.refresh_interval_secs >= session.session_timeout_secs {
        anyhow::bail!(
            "session.refresh_interval_secs ({}) must be shorter than \
             session.session_timeout_secs ({})",
            session.refresh_interval_secs,
            session.session_timeout_secs
        );
    }
    if !(0.0..1.0).contains(&session.refresh_jitter) {
        anyhow::bail!(
            "session.refresh_jitter must be within [0, 1), got {}",
            session.refresh_jitter
        );
    }
    if !session.login_route.starts_with('/') {
        anyhow::bail!(
            "session.login_route must be an absolute path, got '{}'",
            session.login_route
        );
    }
    url::Url::parse(&session.api_base_url).map_err(|e| {
        anyhow::anyhow!(
            "session.api_base_url '{}' is not a valid URL: {e}",
            session.api_base_url
        )
    })?;
    if session.event_channel_capacity == 0 {
        anyhow::bail!("session.event_channel_capacity must be greater than zero");
    }

    let performance = &config.performance;
    if performance.max_metrics_count == 0 {
        anyhow::bail!("performance.max_metrics_count must be greater than zero");
    }
    if performance.sweep_interval_secs == 0 {
        anyhow::bail!("performance.sweep_interval_secs must be greater than zero");
    }

    Ok(())
}
