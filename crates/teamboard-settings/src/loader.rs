//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`TeamboardSettings::default()`]
//! 2. If `~/.teamboard/settings.json` exists, deep-merge user values over defaults
//! 3. Apply `TEAMBOARD_*` environment variable overrides (highest priority)
//! 4. Validate the result
//!
//! Deep merge rules:
//! - Objects are merged recursively (source overrides target per-key)
//! - Arrays and primitives are replaced entirely by source
//! - Null values in source are skipped (preserving target)

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::errors::Result;
use crate::types::TeamboardSettings;

/// Resolve the path to the settings file (`~/.teamboard/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".teamboard").join("settings.json")
}

/// Load settings from the default path with env var overrides.
pub fn load_settings() -> Result<TeamboardSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific path with env var overrides.
///
/// If the file does not exist, returns defaults. Invalid JSON or a value
/// that fails validation is an error.
pub fn load_settings_from_path(path: &Path) -> Result<TeamboardSettings> {
    let mut settings = read_layered(path)?;
    apply_env_overrides(&mut settings);
    settings.validate()?;
    Ok(settings)
}

fn read_layered(path: &Path) -> Result<TeamboardSettings> {
    let defaults = serde_json::to_value(TeamboardSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path)?;
        let user: Value = serde_json::from_str(&content)?;
        deep_merge(defaults, user)
    } else {
        debug!(?path, "settings file not found, using defaults");
        defaults
    };

    Ok(serde_json::from_value(merged)?)
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

/// Apply process environment overrides to loaded settings.
pub fn apply_env_overrides(settings: &mut TeamboardSettings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides read through `lookup`.
///
/// Parsing is strict; an invalid value is logged and ignored so the file or
/// default value stays in effect.
pub fn apply_overrides_from<F>(settings: &mut TeamboardSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.string("TEAMBOARD_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("TEAMBOARD_LOG_JSON") {
        settings.logging.json = v;
    }

    // ── Remote ──────────────────────────────────────────────────────
    if let Some(v) = env.string("TEAMBOARD_REMOTE_ENDPOINT") {
        settings.remote.endpoint = v;
    }
    if let Some(v) = env.string("TEAMBOARD_REMOTE_PROJECT") {
        settings.remote.project_id = v;
    }
    if let Some(v) = env.string("TEAMBOARD_REMOTE_API_KEY") {
        settings.remote.api_key = Some(v);
    }

    // ── Notifications ───────────────────────────────────────────────
    if let Some(v) = env.u64("TEAMBOARD_TOAST_MS", 100, 600_000) {
        settings.notifications.toast_duration_ms = v;
    }
    if let Some(v) = env.usize("TEAMBOARD_MAX_TOASTS", 1, 50) {
        settings.notifications.max_visible = v;
    }

    // ── Policy ──────────────────────────────────────────────────────
    if let Some(v) = env.variant("TEAMBOARD_PROJECT_DELETION") {
        settings.policy.project_deletion = v;
    }
    if let Some(v) = env.variant("TEAMBOARD_PROJECT_CREATION") {
        settings.policy.project_creation = v;
    }
    if let Some(v) = env.variant("TEAMBOARD_ROLE_REDIRECT") {
        settings.policy.role_mismatch_redirect = v;
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

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `usize` within a range.
pub fn parse_usize_range(val: &str, min: usize, max: usize) -> Option<usize> {
    let n: usize = val.parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a camelCase enum variant name (e.g. `orphanAndHide`).
pub fn parse_variant<T: DeserializeOwned>(val: &str) -> Option<T> {
    serde_json::from_value(Value::String(val.to_string())).ok()
}

// ── Env var readers (thin wrappers) ─────────────────────────────────────────

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, name: &str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.is_empty())
    }

    fn bool(&self, name: &str) -> Option<bool> {
        let val = (self.lookup)(name)?;
        let result = parse_bool(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }

    fn usize(&self, name: &str, min: usize, max: usize) -> Option<usize> {
        let val = (self.lookup)(name)?;
        let result = parse_usize_range(&val, min, max);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "invalid usize env var, ignoring");
        }
        result
    }

    fn variant<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        let val = (self.lookup)(name)?;
        let result = parse_variant(&val);
        if result.is_none() {
            tracing::warn!(key = name, value = %val, "unknown policy value, ignoring");
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
