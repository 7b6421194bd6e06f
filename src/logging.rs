use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt::time::UtcTime, layer::Identity, prelude::*, EnvFilter};

use crate::config::{LogFormat, LoggingConfig};

/// Keeps the non-blocking file writer flushing until dropped.
///
/// Hold this in `main` for the lifetime of the process; dropping it early
/// loses buffered file log lines.
#[must_use = "dropping the guard stops the file log writer"]
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Initialize logging: stdout plus an optional rolling file appender.
///
/// Filter precedence: `logging.level` from config, then `RUST_LOG`, then `info`.
/// Calling this twice is harmless; the second global subscriber install is ignored.
pub fn init_with_config(cfg: &LoggingConfig) -> LoggingGuard {
    let (file_writer, file_guard) = if cfg.enable_file_logging {
        build_file_writer(cfg).unzip()
    } else {
        (None, None)
    };

    match cfg.format {
        LogFormat::Json => init_json_logging(env_filter(cfg), file_writer),
        LogFormat::Text => init_text_logging(env_filter(cfg), file_writer),
    }

    LoggingGuard {
        _file_guard: file_guard,
    }
}

fn env_filter(cfg: &LoggingConfig) -> EnvFilter {
    match &cfg.level {
        Some(level) => EnvFilter::new(level.as_str()),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    }
}

fn init_json_logging(
    env_filter: EnvFilter,
    file_writer: Option<tracing_appender::non_blocking::NonBlocking>,
) {
    let registry = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout),
    );

    if let Some(writer) = file_writer {
        let file_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer);
        let _ = registry.with(file_layer).try_init();
        return;
    }

    let _ = registry.with(Identity::new()).try_init();
}

fn init_text_logging(
    env_filter: EnvFilter,
    file_writer: Option<tracing_appender::non_blocking::NonBlocking>,
) {
    let registry = tracing_subscriber::registry().with(env_filter).with(
        tracing_subscriber::fmt::layer()
            .with_ansi(true)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(std::io::stdout),
    );

    if let Some(writer) = file_writer {
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_timer(UtcTime::rfc_3339())
            .with_writer(writer);
        let _ = registry.with(file_layer).try_init();
        return;
    }

    let _ = registry.with(Identity::new()).try_init();
}

fn build_file_writer(
    cfg: &LoggingConfig,
) -> Option<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let rotation = match cfg.rotation.to_lowercase().as_str() {
        "hourly" => tracing_appender::rolling::Rotation::HOURLY,
        "never" => tracing_appender::rolling::Rotation::NEVER,
        _ => tracing_appender::rolling::Rotation::DAILY,
    };

    if std::fs::create_dir_all(&cfg.dir).is_err() {
        eprintln!(
            "Failed to create log directory '{}', continuing with stdout logs",
            cfg.dir
        );
        return None;
    }

    let file_appender =
        tracing_appender::rolling::RollingFileAppender::new(rotation, &cfg.dir, &cfg.filename);
    Some(tracing_appender::non_blocking(file_appender))
}
