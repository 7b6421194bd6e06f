//! Root configuration types.

use super::logging::LoggingConfig;
use super::performance::PerformanceConfig;
use super::rate_limit::RateLimitConfig;
use super::session::SessionConfig;
use serde::{Deserialize, Serialize};

/// Root configuration struct for the Clutch runtime.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub rate_limits: RateLimitConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}
