//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`StreamingSettings::default()`]
//! 2. If `<root>/settings.json` exists, deep-merge file values over defaults
//! 3. Apply `STREAMHOST_*` environment variable overrides
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::errors::{Result, SettingsError};
use crate::types::StreamingSettings;

pub const SETTINGS_FILE_NAME: &str = "settings.json";

/// Default configuration root: `$STREAMHOST_HOME`, else `~/.streamhost`.
pub fn default_config_root() -> PathBuf {
    if let Some(dir) = read_env_string("STREAMHOST_HOME") {
        return PathBuf::from(dir);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".streamhost")
}

/// Path of the settings file under a configuration root.
pub fn settings_path(root: &Path) -> PathBuf {
    root.join(SETTINGS_FILE_NAME)
}

/// Load settings from the default root with env var overrides.
pub fn load_settings() -> Result<StreamingSettings> {
    load_settings_from_path(&settings_path(&default_config_root()))
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. If the file contains
/// invalid JSON, returns [`SettingsError::Parse`].
pub fn load_settings_from_path(path: &Path) -> Result<StreamingSettings> {
    let defaults = serde_json::to_value(StreamingSettings::default())
        .map_err(|e| SettingsError::parse(path, e))?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let file: Value =
            serde_json::from_str(&content).map_err(|e| SettingsError::parse(path, e))?;
        deep_merge(defaults, file)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    let mut settings: StreamingSettings =
        serde_json::from_value(merged).map_err(|e| SettingsError::parse(path, e))?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
    match (target, source) {
        (Value::Object(mut target_map), Value::Object(source_map)) => {
            for (key, source_val) in source_map {
                if source_val.is_null() {
                    continue;
                }
                let merged = if let Some(target_val) = target_map.remove(&key) {
                    deep_merge(target_val, source_val)
                } else {
                    source_val
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Apply environment variable overrides to loaded settings.
///
/// - Floats must parse and fall within the given range
/// - Booleans accept: `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`
/// - Invalid values are ignored with a warning (file/default value stays)
pub fn apply_env_overrides(settings: &mut StreamingSettings) {
    // ── Signaling ───────────────────────────────────────────────────
    if let Some(v) = read_env_string("STREAMHOST_SIGNALING_TYPE") {
        settings.signaling.transport_type = v;
    }
    if let Some(v) = read_env_string("STREAMHOST_SIGNALING_URL") {
        settings.signaling.endpoint_url = v;
    }
    if let Some(v) = read_env_f64("STREAMHOST_POLL_INTERVAL", 0.01, 3600.0) {
        settings.signaling.poll_interval_secs = v;
    }

    // ── Session ─────────────────────────────────────────────────────
    if let Some(v) = read_env_bool("STREAMHOST_HARDWARE_ENCODER") {
        settings.hardware_encoder = v;
    }
    if let Some(v) = read_env_bool("STREAMHOST_AUTO_START") {
        settings.auto_start = v;
    }
    if let Some(v) = read_env_usize("STREAMHOST_EVENT_QUEUE", 1, 65_536) {
        settings.event_queue_capacity = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = read_env_string("STREAMHOST_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = read_env_bool("STREAMHOST_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions (testable without env vars) ──────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Parse a string as a finite `f64` within a range.
pub fn parse_f64_range(val: &str, min: f64, max: f64) -> Option<f64> {
    let n: f64 = val.trim().parse().ok()?;
    (n.is_finite() && n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

fn read_env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn read_env_bool(name: &str) -> Option<bool> {
    let val = std::env::var(name).ok()?;
    let result = parse_bool(&val);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
    }
    result
}

fn read_env_f64(name: &str, min: f64, max: f64) -> Option<f64> {
    let val = std::env::var(name).ok()?;
    let result = parse_f64_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid float env var, ignoring");
    }
    result
}

fn read_env_usize(name: &str, min: usize, max: usize) -> Option<usize> {
    let val = std::env::var(name).ok()?;
    let result = parse_usize_range(&val, min, max);
    if result.is_none() {
        tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
    }
    result
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
