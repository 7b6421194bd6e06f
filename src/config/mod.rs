//! Configuration module for the Clutch runtime.
//!
//! This module provides configuration management with support for:
//! - JSON configuration files
//! - Environment variable overrides
//! - Stdin input
//! - Sensible defaults
//!
//! # Module Structure
//!
//! - [`crate::config::types`]: Root `Config` struct
//! - [`rate_limit`]: Named request buckets
//! - [`session`]: Token refresh and absolute session timeout
//! - [`performance`]: Metric retention and budgets
//! - [`logging`]: Logging configuration
//! - [`crate::config::loader`]: Configuration loading functions
//! - [`crate::config::validation`]: Configuration validation functions
//! - [`crate::config::defaults`]: Default value functions

pub mod defaults;
pub mod loader;
pub mod logging;
pub mod performance;
pub mod rate_limit;
pub mod session;
pub mod types;
pub mod validation;

pub use loader::{load, load_from_path};

pub use logging::{LogFormat, LogLevel, LoggingConfig};

pub use performance::PerformanceConfig;

pub use rate_limit::{BucketConfig, RateLimitConfig};

pub use session::SessionConfig;

pub use types::Config;

pub use validation::validate_config;
