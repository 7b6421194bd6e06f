use super::{RateLimiter, RateLimiterStats};
use crate::config::{BucketConfig, RateLimitConfig};
use crate::metrics::RuntimeMetrics;
use std::sync::Arc;

/// The dashboard's named buckets. Each bucket is independent; nothing is
/// shared between them except the metrics sink.
#[derive(Debug, Clone)]
pub struct RateLimiters {
    pub general: Arc<RateLimiter>,
    pub auth: Arc<RateLimiter>,
    pub dashboard: Arc<RateLimiter>,
    pub realtime: Arc<RateLimiter>,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig, metrics: Arc<RuntimeMetrics>) -> Self {
        let build = |name: &str, bucket: BucketConfig| {
            Arc::new(RateLimiter::with_metrics(
                name,
                bucket,
                Arc::clone(&metrics),
            ))
        };

        Self {
            general: build("general", config.general),
            auth: build("auth", config.auth),
            dashboard: build("dashboard", config.dashboard),
            realtime: build("realtime", config.realtime),
        }
    }

    /// Look a bucket up by name (`general`, `auth`, `dashboard`, `realtime`).
    pub fn get(&self, name: &str) -> Option<&Arc<RateLimiter>> {
        match name {
            "general" => Some(&self.general),
            "auth" => Some(&self.auth),
            "dashboard" => Some(&self.dashboard),
            "realtime" => Some(&self.realtime),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<RateLimiter>> {
        [&self.general, &self.auth, &self.dashboard, &self.realtime].into_iter()
    }

    pub fn reset_all(&self) {
        for limiter in self.iter() {
            limiter.reset();
        }
    }

    pub fn stats(&self) -> Vec<RateLimiterStats> {
        self.iter().map(|limiter| limiter.stats()).collect()
    }
}
