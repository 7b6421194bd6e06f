use clutch_runtime::config::{self, BucketConfig, Config};
use serial_test::serial;
use std::env;
use std::io::Write;
use tempfile::NamedTempFile;

const CONFIG_ENV_VARS: &[&str] = &[
    "CLUTCH_RUNTIME_CONFIG_PATH",
    "CLUTCH_RUNTIME_CONFIG_JSON",
    "CLUTCH_RUNTIME_CONFIG_STDIN",
    "CLUTCH_RUNTIME__RATE_LIMITS__AUTH__MAX_REQUESTS",
    "CLUTCH_RUNTIME__SESSION__LOGIN_ROUTE",
];

fn clear_config_env() {
    for var in CONFIG_ENV_VARS {
        env::remove_var(var);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(json.as_bytes()).unwrap();
    file
}

#[test]
fn defaults_describe_the_dashboard_buckets() {
    let cfg = Config::default();

    assert_eq!(cfg.rate_limits.general, BucketConfig::new(100, 60_000, 10));
    assert_eq!(cfg.rate_limits.auth, BucketConfig::new(5, 60_000, 2));
    assert_eq!(cfg.session.refresh_interval_secs, 14 * 60);
    assert_eq!(cfg.session.session_timeout_secs, 7 * 24 * 60 * 60);
    assert_eq!(cfg.performance.max_metrics_count, 1000);
    assert_eq!(cfg.performance.budgets["api_call"], 5000);
    config::validate_config(&cfg).unwrap();
}

#[test]
fn partial_file_keeps_other_defaults() {
    let file = write_config(
        r#"{
            "rate_limits": { "dashboard": { "max_requests": 12 } },
            "performance": { "budgets": { "chart_render": 40 } }
        }"#,
    );

    let cfg = config::load_from_path(file.path()).unwrap();

    assert_eq!(cfg.rate_limits.dashboard.max_requests, 12);
    assert_eq!(
        cfg.rate_limits.dashboard.window_ms,
        Config::default().rate_limits.dashboard.window_ms
    );
    assert_eq!(cfg.performance.budgets["chart_render"], 40);
    assert_eq!(cfg.performance.budgets["page_load"], 3000);
}

#[test]
fn invalid_file_is_rejected_by_load_from_path() {
    let file = write_config(
        r#"{ "session": { "refresh_interval_secs": 900, "session_timeout_secs": 600 } }"#,
    );

    let err = config::load_from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("refresh_interval_secs"), "{err}");
}

#[test]
#[serial]
fn env_overrides_beat_config_file() {
    clear_config_env();
    let file = write_config(r#"{ "rate_limits": { "auth": { "max_requests": 9 } } }"#);
    env::set_var("CLUTCH_RUNTIME_CONFIG_PATH", file.path());
    env::set_var("CLUTCH_RUNTIME__RATE_LIMITS__AUTH__MAX_REQUESTS", "3");
    env::set_var("CLUTCH_RUNTIME__SESSION__LOGIN_ROUTE", "/signin");

    let cfg = config::load();
    clear_config_env();

    assert_eq!(cfg.rate_limits.auth.max_requests, 3);
    assert_eq!(cfg.session.login_route, "/signin");
}

#[test]
#[serial]
fn inline_json_beats_config_path() {
    clear_config_env();
    let file = write_config(r#"{ "performance": { "max_metrics_count": 50 } }"#);
    env::set_var("CLUTCH_RUNTIME_CONFIG_PATH", file.path());
    env::set_var(
        "CLUTCH_RUNTIME_CONFIG_JSON",
        r#"{ "performance": { "max_metrics_count": 75 } }"#,
    );

    let cfg = config::load();
    clear_config_env();

    assert_eq!(cfg.performance.max_metrics_count, 75);
}

#[test]
#[serial]
fn unparsable_sources_fall_back_to_defaults() {
    clear_config_env();
    env::set_var("CLUTCH_RUNTIME_CONFIG_JSON", "{ not json");

    let cfg = config::load();
    clear_config_env();

    assert_eq!(cfg.rate_limits, Config::default().rate_limits);
}
