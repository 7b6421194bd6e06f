//! Default value functions for configuration fields.
//!
//! This module contains all the default value functions used by serde's `#[serde(default = ...)]`
//! attributes throughout the configuration system. Functions are organized by category for
//! easier maintenance.

use super::logging::LogFormat;
use std::collections::BTreeMap;

// =============================================================================
// Rate Limit Bucket Defaults
// =============================================================================

/// Delay returned by a bucket that is blocked only on concurrency (milliseconds).
pub const CONCURRENCY_RETRY_DELAY_MS: u64 = 100;

/// Waits longer than this are logged (milliseconds).
pub const LONG_WAIT_LOG_THRESHOLD_MS: u64 = 1000;

pub const fn default_general_max_requests() -> u32 {
    100
}

pub const fn default_general_window_ms() -> u64 {
    60_000
}

pub const fn default_general_max_concurrent() -> u32 {
    10
}

pub const fn default_auth_max_requests() -> u32 {
    5
}

pub const fn default_auth_window_ms() -> u64 {
    60_000
}

pub const fn default_auth_max_concurrent() -> u32 {
    2
}

pub const fn default_dashboard_max_requests() -> u32 {
    30
}

pub const fn default_dashboard_window_ms() -> u64 {
    60_000
}

pub const fn default_dashboard_max_concurrent() -> u32 {
    5
}

pub const fn default_realtime_max_requests() -> u32 {
    120
}

pub const fn default_realtime_window_ms() -> u64 {
    60_000
}

pub const fn default_realtime_max_concurrent() -> u32 {
    3
}

// =============================================================================
// Session Defaults
// =============================================================================

/// 14 minutes, one minute ahead of the 15 minute access-token expiry.
pub const fn default_refresh_interval_secs() -> u64 {
    14 * 60
}

/// 7 days, the refresh-token lifetime.
pub const fn default_session_timeout_secs() -> u64 {
    7 * 24 * 60 * 60
}

pub const fn default_refresh_jitter() -> f64 {
    0.05
}

pub fn default_login_route() -> String {
    "/login".to_string()
}

pub fn default_api_base_url() -> String {
    "http://localhost:5000/api".to_string()
}

pub const fn default_request_timeout_secs() -> u64 {
    10
}

pub const fn default_event_channel_capacity() -> usize {
    256
}

// =============================================================================
// Performance Defaults
// =============================================================================

pub const fn default_max_metrics_age_secs() -> u64 {
    300 // 5 minutes
}

pub const fn default_max_metrics_count() -> usize {
    1000
}

pub const fn default_sweep_interval_secs() -> u64 {
    60
}

pub const fn default_max_budget_violations() -> usize {
    100
}

pub const fn default_default_metrics_limit() -> usize {
    100
}

pub fn default_budgets() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("api_call".to_string(), 5000),
        ("function_execution".to_string(), 1000),
        ("page_load".to_string(), 3000),
        ("component_render".to_string(), 100),
    ])
}

// =============================================================================
// Logging Defaults
// =============================================================================

pub fn default_log_dir() -> String {
    "logs".to_string()
}

pub fn default_log_filename() -> String {
    "clutch-runtime.log".to_string()
}

pub fn default_rotation() -> String {
    "daily".to_string()
}

pub const fn default_enable_file_logging() -> bool {
    false
}

pub const fn default_log_format() -> LogFormat {
    LogFormat::Json
}
