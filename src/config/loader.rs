//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Prefix for per-field environment overrides.
pub const ENV_OVERRIDE_PREFIX: &str = "CLUTCH_RUNTIME__";

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE_NAME: &str = "clutch-runtime.json";

/// Load configuration with the following precedence (highest first):
/// 1) `CLUTCH_RUNTIME_CONFIG_JSON` env var containing raw JSON
/// 2) If `CLUTCH_RUNTIME_CONFIG_STDIN=true/1`, read JSON from stdin
/// 3) File pointed by `CLUTCH_RUNTIME_CONFIG_PATH` env var
/// 4) `clutch-runtime.json` in the current working directory
/// 5) Defaults compiled into the binary
///
/// Individual fields can then be overridden with `CLUTCH_RUNTIME__` variables,
/// using `__` as the nested separator, e.g. `CLUTCH_RUNTIME__SESSION__LOGIN_ROUTE=/signin`
/// or `CLUTCH_RUNTIME__RATE_LIMITS__AUTH__MAX_REQUESTS=3`.
///
/// Sources are deep-merged over the serialized defaults, so a partial object
/// (for instance one extra budget entry) keeps every other default.
///
/// Read, parse and validation problems are reported on stderr and never
/// abort loading; callers that need a hard failure call
/// [`validate_config`](super::validation::validate_config) on the result.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::io::Read;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // Lowest precedence first; later merges win.
    merge_file_source(&mut merged, &PathBuf::from(CONFIG_FILE_NAME));

    if let Ok(path) = env::var("CLUTCH_RUNTIME_CONFIG_PATH") {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if let Ok(val) = env::var("CLUTCH_RUNTIME_CONFIG_STDIN") {
        if env_var_truthy(&val) {
            let mut buf = String::new();
            if let Err(e) = std::io::stdin().read_to_string(&mut buf) {
                eprintln!("Failed to read config from stdin: {e}");
            } else if let Some(value) = parse_json_document(&buf, "stdin") {
                merge_values(&mut merged, value);
            }
        }
    }

    if let Ok(json) = env::var("CLUTCH_RUNTIME_CONFIG_JSON") {
        if let Some(value) = parse_json_document(&json, "CLUTCH_RUNTIME_CONFIG_JSON") {
            merge_values(&mut merged, value);
        }
    }

    apply_env_overrides(&mut merged, env::vars());

    let config = match serde_json::from_value::<Config>(merged) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to deserialize config; using defaults: {e}");
            defaults
        }
    };

    if let Err(e) = validate_config(&config) {
        eprintln!("Configuration validation error: {e}");
    }

    config
}

/// Load a configuration from a single JSON file merged over the defaults.
///
/// Unlike [`load`], failures are returned to the caller.
pub fn load_from_path(path: &Path) -> anyhow::Result<Config> {
    let contents = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config {}: {e}", path.display()))?;
    let source: Value = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config {}: {e}", path.display()))?;

    let mut merged = serde_json::to_value(Config::default())?;
    merge_values(&mut merged, source);
    let config: Config = serde_json::from_value(merged)?;
    validate_config(&config)?;
    Ok(config)
}

fn parse_json_document(raw: &str, label: &str) -> Option<Value> {
    if raw.trim().is_empty() {
        return None;
    }

    match serde_json::from_str(raw) {
        Ok(value) => Some(value),
        Err(err) => {
            eprintln!("Failed to parse config from {label}: {err}");
            None
        }
    }
}

fn merge_file_source(target: &mut Value, path: &Path) {
    if path.as_os_str().is_empty() || !path.exists() {
        return;
    }

    match fs::read_to_string(path) {
        Ok(contents) => {
            if let Some(value) = parse_json_document(&contents, &format!("file {}", path.display()))
            {
                merge_values(target, value);
            }
        }
        Err(err) => {
            eprintln!("Failed to read config from {}: {}", path.display(), err);
        }
    }
}

fn merge_values(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(existing) => merge_values(existing, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (target_slot, source_value) => {
            *target_slot = source_value;
        }
    }
}

fn apply_env_overrides<I>(root: &mut Value, vars: I)
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, raw_value) in vars {
        let Some(stripped) = key.strip_prefix(ENV_OVERRIDE_PREFIX) else {
            continue;
        };

        let segments: Vec<String> = stripped
            .split("__")
            .filter(|segment| !segment.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();

        if segments.is_empty() {
            continue;
        }

        set_nested_value(root, &segments, parse_scalar(raw_value.trim()));
    }
}

fn env_var_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };

    if !target.is_object() {
        *target = Value::Object(serde_json::Map::new());
    }
    let Value::Object(map) = target else {
        return;
    };

    if rest.is_empty() {
        map.insert(head.clone(), value);
        return;
    }

    let entry = map
        .entry(head.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}
