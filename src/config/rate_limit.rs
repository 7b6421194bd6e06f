//! Rate limit bucket configuration types.

use super::defaults::{
    default_auth_max_concurrent, default_auth_max_requests, default_auth_window_ms,
    default_dashboard_max_concurrent, default_dashboard_max_requests, default_dashboard_window_ms,
    default_general_max_concurrent, default_general_max_requests, default_general_window_ms,
    default_realtime_max_concurrent, default_realtime_max_requests, default_realtime_window_ms,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Limits for a single named bucket.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct BucketConfig {
    /// Maximum number of requests that may start within one window
    pub max_requests: u32,
    /// Sliding window length (milliseconds)
    pub window_ms: u64,
    /// Maximum number of requests in flight at once
    pub max_concurrent_requests: u32,
}

impl BucketConfig {
    #[must_use]
    pub const fn new(max_requests: u32, window_ms: u64, max_concurrent_requests: u32) -> Self {
        Self {
            max_requests,
            window_ms,
            max_concurrent_requests,
        }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

fn default_general_bucket() -> BucketConfig {
    BucketConfig::new(
        default_general_max_requests(),
        default_general_window_ms(),
        default_general_max_concurrent(),
    )
}

fn default_auth_bucket() -> BucketConfig {
    BucketConfig::new(
        default_auth_max_requests(),
        default_auth_window_ms(),
        default_auth_max_concurrent(),
    )
}

fn default_dashboard_bucket() -> BucketConfig {
    BucketConfig::new(
        default_dashboard_max_requests(),
        default_dashboard_window_ms(),
        default_dashboard_max_concurrent(),
    )
}

fn default_realtime_bucket() -> BucketConfig {
    BucketConfig::new(
        default_realtime_max_requests(),
        default_realtime_window_ms(),
        default_realtime_max_concurrent(),
    )
}

/// Preconfigured buckets used by the dashboard.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Ordinary API traffic
    #[serde(default = "default_general_bucket")]
    pub general: BucketConfig,
    /// Login and token endpoints
    #[serde(default = "default_auth_bucket")]
    pub auth: BucketConfig,
    /// Dashboard aggregate queries
    #[serde(default = "default_dashboard_bucket")]
    pub dashboard: BucketConfig,
    /// Polling and live-update calls
    #[serde(default = "default_realtime_bucket")]
    pub realtime: BucketConfig,
}

impl RateLimitConfig {
    /// Iterate over `(bucket name, config)` pairs in a stable order.
    pub fn buckets(&self) -> impl Iterator<Item = (&'static str, &BucketConfig)> {
        [
            ("general", &self.general),
            ("auth", &self.auth),
            ("dashboard", &self.dashboard),
            ("realtime", &self.realtime),
        ]
        .into_iter()
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            general: default_general_bucket(),
            auth: default_auth_bucket(),
            dashboard: default_dashboard_bucket(),
            realtime: default_realtime_bucket(),
        }
    }
}
