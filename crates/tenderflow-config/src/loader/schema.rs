//! Key and type checks applied to every raw JSON5 layer before merging.

use crate::ConfigError;
use chrono::NaiveDate;
use serde_json::{Map, Value};
use std::str::FromStr;
use tenderflow_protocol::DiagramKind;

pub(super) fn validate_layer_schema(value: &Value, layer: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, "")?;
    ensure_allowed_keys(
        map,
        &["$schema", "memory", "model", "analysis", "planning", "workflow"],
        layer,
        "",
    )?;

    if let Some(value) = map.get("$schema") {
        expect_string(value, layer, "$schema")?;
    }
    if let Some(value) = map.get("memory") {
        validate_memory(value, layer, "memory")?;
    }
    if let Some(value) = map.get("model") {
        validate_model(value, layer, "model")?;
    }
    if let Some(value) = map.get("analysis") {
        let map = expect_object(value, layer, "analysis")?;
        ensure_allowed_keys(map, &["excerpt_chars"], layer, "analysis")?;
        if let Some(value) = map.get("excerpt_chars") {
            expect_u64(value, layer, "analysis.excerpt_chars")?;
        }
    }
    if let Some(value) = map.get("planning") {
        validate_planning(value, layer, "planning")?;
    }
    if let Some(value) = map.get("workflow") {
        validate_workflow(value, layer, "workflow")?;
    }
    Ok(())
}

fn validate_memory(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["backend", "path"], layer, path)?;
    if let Some(value) = map.get("backend") {
        expect_one_of(
            value,
            &["file", "in_memory"],
            layer,
            &join_path(path, "backend"),
        )?;
    }
    if let Some(value) = map.get("path") {
        expect_string(value, layer, &join_path(path, "path"))?;
    }
    Ok(())
}

fn validate_model(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "provider",
            "name",
            "base_url",
            "api_key_env",
            "timeout_secs",
            "max_tokens",
        ],
        layer,
        path,
    )?;
    if let Some(value) = map.get("provider") {
        expect_one_of(
            value,
            &["openai", "offline"],
            layer,
            &join_path(path, "provider"),
        )?;
    }
    for key in ["name", "base_url", "api_key_env"] {
        if let Some(value) = map.get(key) {
            expect_string(value, layer, &join_path(path, key))?;
        }
    }
    for key in ["timeout_secs", "max_tokens"] {
        if let Some(value) = map.get(key) {
            expect_u64(value, layer, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn validate_planning(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(
        map,
        &[
            "hourly_rate",
            "hours_per_week",
            "contingency_rate",
            "start_date",
        ],
        layer,
        path,
    )?;
    for key in ["hourly_rate", "hours_per_week", "contingency_rate"] {
        if let Some(value) = map.get(key) {
            expect_f64(value, layer, &join_path(path, key))?;
        }
    }
    if let Some(value) = map.get("start_date") {
        let field = join_path(path, "start_date");
        let Some(raw) = value.as_str() else {
            return Err(invalid_field(layer, &field, "expected string"));
        };
        if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_err() {
            return Err(invalid_field(layer, &field, "expected YYYY-MM-DD date"));
        }
    }
    Ok(())
}

fn validate_workflow(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    let map = expect_object(value, layer, path)?;
    ensure_allowed_keys(map, &["diagrams"], layer, path)?;
    if let Some(value) = map.get("diagrams") {
        let field = join_path(path, "diagrams");
        for (idx, entry) in expect_array(value, layer, &field)?.iter().enumerate() {
            let entry_path = format!("{field}[{idx}]");
            let Some(name) = entry.as_str() else {
                return Err(invalid_field(layer, &entry_path, "expected string"));
            };
            if DiagramKind::from_str(name).is_err() {
                return Err(invalid_field(
                    layer,
                    &entry_path,
                    &format!("unknown diagram type '{name}'"),
                ));
            }
        }
    }
    Ok(())
}

fn expect_object<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Map<String, Value>, ConfigError> {
    value
        .as_object()
        .ok_or_else(|| invalid_field(layer, path, "expected object"))
}

fn expect_array<'a>(
    value: &'a Value,
    layer: &str,
    path: &str,
) -> Result<&'a Vec<Value>, ConfigError> {
    value
        .as_array()
        .ok_or_else(|| invalid_field(layer, path, "expected array"))
}

fn expect_string(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    match value {
        Value::String(_) => Ok(()),
        _ => Err(invalid_field(layer, path, "expected string")),
    }
}

fn expect_u64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_u64() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected non-negative integer"))
    }
}

fn expect_f64(value: &Value, layer: &str, path: &str) -> Result<(), ConfigError> {
    if value.is_number() {
        Ok(())
    } else {
        Err(invalid_field(layer, path, "expected number"))
    }
}

/// String restricted to a fixed set of snake_case variants.
fn expect_one_of(
    value: &Value,
    variants: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match value.as_str() {
        Some(raw) if variants.contains(&raw) => Ok(()),
        Some(raw) => Err(invalid_field(
            layer,
            path,
            &format!("unsupported value '{raw}' (expected one of: {})", variants.join(", ")),
        )),
        None => Err(invalid_field(layer, path, "expected string")),
    }
}

fn ensure_allowed_keys(
    map: &Map<String, Value>,
    allowed: &[&str],
    layer: &str,
    path: &str,
) -> Result<(), ConfigError> {
    match map.keys().find(|key| !allowed.contains(&key.as_str())) {
        Some(key) => Err(invalid_field(layer, &join_path(path, key), "unknown key")),
        None => Ok(()),
    }
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn invalid_field(layer: &str, path: &str, message: &str) -> ConfigError {
    let path = if path.is_empty() { "root" } else { path };
    ConfigError::InvalidField {
        path: format!("{layer}:{path}"),
        message: message.to_string(),
    }
}
