//! Configuration loading and environment parsing.

use super::validation::validate_config;
use super::Config;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Prefix for per-field environment overrides, e.g. `CHAT_RELAY__PORT=9000`.
pub const ENV_OVERRIDE_PREFIX: &str = "CHAT_RELAY__";
/// Inline JSON configuration.
pub const ENV_CONFIG_JSON: &str = "CHAT_RELAY_CONFIG_JSON";
/// Path to a JSON configuration file.
pub const ENV_CONFIG_PATH: &str = "CHAT_RELAY_CONFIG_PATH";

/// Load configuration with the following precedence (highest first):
/// 1) `CHAT_RELAY_CONFIG_JSON` env var containing raw JSON
/// 2) File pointed by `CHAT_RELAY_CONFIG_PATH` env var
/// 3) config.json in current working directory
/// 4) config.json next to the executable
/// 5) Defaults compiled into the binary
///
/// Individual fields can then be overridden by environment variables with
/// prefix `CHAT_RELAY__`, using `__` as the nested separator, e.g.
/// `CHAT_RELAY__RELAY__MAX_FRAME_SIZE=4096` or `CHAT_RELAY__LOGGING__LEVEL=debug`.
///
/// Read and parse errors are printed to stderr and the affected source is
/// skipped. Validation errors are printed but not returned; callers that need
/// a hard failure call [`validate_config`] themselves.
#[must_use]
pub fn load() -> Config {
    use std::env;
    use std::path::PathBuf;

    let defaults = Config::default();
    let mut merged =
        serde_json::to_value(&defaults).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

    // Lowest precedence first so later merges win.
    if let Ok(exe_path) = env::current_exe() {
        if let Some(mut exe_dir) = exe_path.parent().map(Path::to_path_buf) {
            exe_dir.push("config.json");
            merge_file_source(&mut merged, &exe_dir);
        }
    }

    merge_file_source(&mut merged, &PathBuf::from("config.json"));

    if let Ok(path) = env::var(ENV_CONFIG_PATH) {
        merge_file_source(&mut merged, &PathBuf::from(path));
    }

    if let Ok(json) = env::var(ENV_CONFIG_JSON) {
        if let Some(value) = parse_json_document(&json, ENV_CONFIG_JSON) {
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

fn apply_env_overrides(root: &mut Value, vars: impl Iterator<Item = (String, String)>) {
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

        set_nested_value(root, &segments, parse_env_value(&raw_value));
    }
}

fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.contains(',') {
        let items = trimmed
            .split(',')
            .map(|segment| parse_scalar(segment.trim()))
            .collect::<Vec<_>>();
        return Value::Array(items);
    }

    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::String(String::new());
    }

    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let Some((first, rest)) = segments.split_first() else {
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
        map.insert(first.clone(), value);
        return;
    }

    let entry = map
        .entry(first.clone())
        .or_insert_with(|| Value::Object(serde_json::Map::new()));
    set_nested_value(entry, rest, value);
}
