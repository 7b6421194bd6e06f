//! Session monitoring configuration types.

use super::defaults::{
    default_api_base_url, default_event_channel_capacity, default_login_route,
    default_refresh_interval_secs, default_refresh_jitter, default_request_timeout_secs,
    default_session_timeout_secs,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Session refresh and absolute-timeout settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SessionConfig {
    /// Period of the background token refresh (seconds)
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
    /// Absolute session lifetime without user activity (seconds)
    #[serde(default = "default_session_timeout_secs")]
    pub session_timeout_secs: u64,
    /// Fraction of the refresh interval that may be shaved off at random, in `[0, 1)`
    #[serde(default = "default_refresh_jitter")]
    pub refresh_jitter: f64,
    /// Route that suppresses monitoring and receives forced logouts
    #[serde(default = "default_login_route")]
    pub login_route: String,
    /// Base URL of the backend auth API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout applied to each auth API request (seconds)
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Capacity of the platform event broadcast channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl SessionConfig {
    #[must_use]
    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    #[must_use]
    pub const fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_secs)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
            session_timeout_secs: default_session_timeout_secs(),
            refresh_jitter: default_refresh_jitter(),
            login_route: default_login_route(),
            api_base_url: default_api_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}
