#![cfg_attr(not(test), deny(clippy::panic))]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

//! # Clutch Runtime
//!
//! Client-side runtime services for the Clutch employee dashboard: per-bucket
//! request admission, session keep-alive with an absolute inactivity timeout,
//! and in-process performance sampling with budgets.

/// Runtime configuration and environment variables
pub mod config;

/// Structured logging configuration
pub mod logging;

/// Operational counters and latency histograms
pub mod metrics;

/// Timing samples, eviction, summaries and budgets
pub mod performance;

/// Sliding-window and concurrency admission control
pub mod rate_limit;

/// Composition root wiring every component together
pub mod runtime;

/// Token refresh, inactivity timeout and session teardown
pub mod session;
