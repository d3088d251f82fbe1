//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`CourierSettings::default()`]
//! 2. If the settings file exists, deep-merge its values over the defaults
//! 3. Apply `COURIER_*` environment variable overrides
//! 4. Apply the caller's overrides (command-line flags)
//! 5. Validate the result

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::CourierSettings;

/// Upper bound accepted for `COURIER_MAX_HOLD_MS`.
const MAX_HOLD_CEILING_MS: u64 = 300_000;

/// Resolve the path to the settings file (`~/.courier/settings.json`).
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".courier").join("settings.json")
}

/// Load settings from `path`, then env var overrides, then `overrides`.
///
/// Validation runs once on the final result, so a value rejected in the file
/// can still be corrected by a later layer. A missing file yields defaults.
pub fn load_settings_from_path<F>(path: &Path, overrides: F) -> Result<CourierSettings>
where
    F: FnOnce(&mut CourierSettings),
{
    let mut settings = read_settings_file(path)?;
    apply_env_overrides(&mut settings);
    overrides(&mut settings);
    validate(&settings)?;
    Ok(settings)
}

/// Defaults merged with the file at `path`, without env overrides.
pub fn read_settings_file(path: &Path) -> Result<CourierSettings> {
    let defaults = serde_json::to_value(CourierSettings::default())?;

    let merged = if path.exists() {
        debug!(?path, "loading settings from file");
        let content = std::fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
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
                let merged = match target_map.remove(&key) {
                    Some(target_val) => deep_merge(target_val, source_val),
                    None => source_val,
                };
                let _ = target_map.insert(key, merged);
            }
            Value::Object(target_map)
        }
        (_, source) => source,
    }
}

/// Reject settings the server cannot run with.
pub fn validate(settings: &CourierSettings) -> Result<()> {
    if parse_route_path(&settings.server.path).is_none() {
        return Err(SettingsError::invalid(
            "server.path",
            format!("must start with '/', got {:?}", settings.server.path),
        ));
    }
    if settings.server.max_body_bytes == 0 {
        return Err(SettingsError::invalid(
            "server.maxBodyBytes",
            "must be greater than zero",
        ));
    }
    if parse_log_level(&settings.logging.level).is_none() {
        return Err(SettingsError::invalid(
            "logging.level",
            format!("unknown level {:?}", settings.logging.level),
        ));
    }
    if let Some((module, level)) = settings
        .logging
        .modules
        .iter()
        .find(|(_, level)| parse_log_level(level).is_none())
    {
        return Err(SettingsError::invalid(
            "logging.modules",
            format!("unknown level {level:?} for {module}"),
        ));
    }
    Ok(())
}

/// Apply environment variable overrides from the process environment.
///
/// Invalid values are logged and ignored.
pub fn apply_env_overrides(settings: &mut CourierSettings) {
    apply_env_overrides_from(settings, |name| std::env::var(name).ok());
}

/// Apply overrides read through `lookup` instead of the process environment.
pub fn apply_env_overrides_from<F>(settings: &mut CourierSettings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let env = EnvReader { lookup };

    // ── Server ──────────────────────────────────────────────────────
    if let Some(v) = env.string("COURIER_HOST") {
        settings.server.host = v;
    }
    if let Some(v) = env.u16("COURIER_PORT", 1, 65535) {
        settings.server.port = v;
    }
    if let Some(v) = env.route_path("COURIER_PATH") {
        settings.server.path = v;
    }

    // ── Broker ──────────────────────────────────────────────────────
    if let Some(v) = env.u64("COURIER_MAX_HOLD_MS", 0, MAX_HOLD_CEILING_MS) {
        settings.broker.max_hold_ms = v;
    }

    // ── Logging ─────────────────────────────────────────────────────
    if let Some(v) = env.log_level("COURIER_LOG_LEVEL") {
        settings.logging.level = v;
    }
    if let Some(v) = env.bool("COURIER_LOG_JSON") {
        settings.logging.json = v;
    }
}

// ── Pure parsing functions ──────────────────────────────────────────────────

/// Parse a string as a boolean.
///
/// Accepts (case-insensitive): `true`/`1`/`yes`/`on` or `false`/`0`/`no`/`off`.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Accept a route only if it is rooted (`/bayeux`, not `bayeux`).
pub fn parse_route_path(val: &str) -> Option<String> {
    let path = val.trim();
    path.starts_with('/').then(|| path.to_string())
}

/// Accept a level name `tracing` understands (`trace` .. `error`, any case).
pub fn parse_log_level(val: &str) -> Option<String> {
    let level = val.trim();
    level
        .parse::<tracing::Level>()
        .is_ok()
        .then(|| level.to_lowercase())
}

/// Parse a string as a `u16` within a range.
pub fn parse_u16_range(val: &str, min: u16, max: u16) -> Option<u16> {
    let n: u16 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

/// Parse a string as a `u64` within a range.
pub fn parse_u64_range(val: &str, min: u64, max: u64) -> Option<u64> {
    let n: u64 = val.trim().parse().ok()?;
    (n >= min && n <= max).then_some(n)
}

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
            warn!(key = name, value = %val, "invalid boolean env var, ignoring");
        }
        result
    }

    fn route_path(&self, name: &str) -> Option<String> {
        let val = self.string(name)?;
        let result = parse_route_path(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "route env var must start with '/', ignoring");
        }
        result
    }

    fn log_level(&self, name: &str) -> Option<String> {
        let val = self.string(name)?;
        let result = parse_log_level(&val);
        if result.is_none() {
            warn!(key = name, value = %val, "unknown log level env var, ignoring");
        }
        result
    }

    fn u16(&self, name: &str, min: u16, max: u16) -> Option<u16> {
        let val = (self.lookup)(name)?;
        let result = parse_u16_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u16 env var, ignoring");
        }
        result
    }

    fn u64(&self, name: &str, min: u64, max: u64) -> Option<u64> {
        let val = (self.lookup)(name)?;
        let result = parse_u64_range(&val, min, max);
        if result.is_none() {
            warn!(key = name, value = %val, "invalid u64 env var, ignoring");
        }
        result
    }
}
