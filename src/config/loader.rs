//! Configuration loading and environment parsing.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use super::validation::validate;
use super::Config;

/// Environment variable naming a config file, checked when no `--config`
/// flag is given.
pub const CONFIG_PATH_ENV: &str = "GAMBIT_CONFIG";

/// Prefix for field-level environment overrides, nested with `__`:
/// `GAMBIT__SERVER__PORT=9000`, `GAMBIT__LOGGING__LEVEL=debug`.
pub const ENV_OVERRIDE_PREFIX: &str = "GAMBIT__";

/// Load configuration. Exactly one file source is used, the first available:
///
/// 1. `explicit_path` (the `--config` flag), which must exist and parse;
/// 2. the file named by `GAMBIT_CONFIG`, which must exist and parse;
/// 3. `./config.json` if present;
/// 4. compiled-in defaults.
///
/// Environment overrides (`GAMBIT__SECTION__FIELD`) are applied on top of the
/// file layer, then the result is validated. Unknown fields anywhere fail the
/// load.
pub fn load(explicit_path: Option<&Path>) -> anyhow::Result<Config> {
    let mut merged = serde_json::to_value(Config::default())
        .context("failed to serialize built-in defaults")?;

    if let Some(source) = file_source(explicit_path)? {
        let contents = fs::read_to_string(&source)
            .with_context(|| format!("failed to read config file {}", source.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse config file {}", source.display()))?;
        merge_values(&mut merged, value);
        tracing::debug!(path = %source.display(), "loaded configuration file");
    }

    apply_env_overrides(&mut merged);

    let config: Config =
        serde_json::from_value(merged).context("configuration does not match the schema")?;
    validate(&config)?;
    Ok(config)
}

/// Resolve which config file to read, if any. An explicitly named file that
/// does not exist is an error; a missing `./config.json` is not.
fn file_source(explicit_path: Option<&Path>) -> anyhow::Result<Option<PathBuf>> {
    if let Some(path) = explicit_path {
        if !path.exists() {
            anyhow::bail!("config file {} does not exist", path.display());
        }
        return Ok(Some(path.to_path_buf()));
    }

    if let Ok(path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(path);
        if !path.exists() {
            anyhow::bail!(
                "{CONFIG_PATH_ENV} points at {} which does not exist",
                path.display()
            );
        }
        return Ok(Some(path));
    }

    let cwd_default = PathBuf::from("config.json");
    if cwd_default.exists() {
        return Ok(Some(cwd_default));
    }

    Ok(None)
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

fn apply_env_overrides(root: &mut Value) {
    for (key, raw_value) in env::vars() {
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

/// Interpret an override value: whole-string JSON first (numbers, booleans,
/// quoted strings, inline arrays/objects), then a comma list of scalars,
/// then a plain string.
fn parse_env_value(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return value;
    }
    if trimmed.contains(',') {
        let items = trimmed
            .split(',')
            .map(|segment| parse_scalar(segment.trim()))
            .collect();
        return Value::Array(items);
    }
    parse_scalar(trimmed)
}

fn parse_scalar(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn set_nested_value(target: &mut Value, segments: &[String], value: Value) {
    let mut cursor = target;
    let Some((leaf, path)) = segments.split_last() else {
        return;
    };
    for segment in path {
        let map = ensure_object(cursor);
        cursor = map
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
    }
    ensure_object(cursor).insert(leaf.clone(), value);
}

fn ensure_object(value: &mut Value) -> &mut serde_json::Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(serde_json::Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just coerced into an object"),
    }
}
