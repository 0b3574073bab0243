//! Settings loading from configuration files.
//!
//! ## Loading Order
//!
//! 1. Start with [`Settings::default`].
//! 2. Deep-merge a TOML or JSON document over the defaults.
//! 3. Apply `TABLEWRIGHT_*` environment variable overrides (highest priority).
//!
//! ## Environment Variable Mapping
//!
//! | Env Var | Setting |
//! |---|---|
//! | `TABLEWRIGHT_DEBUG` | `debug` |
//! | `TABLEWRIGHT_LOG_LEVEL` | `log_level` |
//! | `TABLEWRIGHT_DIALECT` | `dialect` |
//! | `TABLEWRIGHT_DATABASE_URL` | `database.url` |
//! | `TABLEWRIGHT_DATABASE_NAME` | `database.name` |
//! | `TABLEWRIGHT_MIGRATIONS_ROOT` | `migrations_root` |
//! | `TABLEWRIGHT_STATEMENT_TIMEOUT` | `statement_timeout_secs` |
//!
//! ## Examples
//!
//! ```rust,no_run
//! use tablewright_core::settings_loader;
//!
//! let settings = settings_loader::from_toml_file_with_env("tablewright.toml").unwrap();
//! ```

use std::path::{Path, PathBuf};

use crate::error::TablewrightError;
use crate::settings::Settings;

/// Loads settings from a TOML string. Keys not present keep their defaults.
pub fn from_toml_str(toml_str: &str) -> Result<Settings, TablewrightError> {
    let toml_value: toml::Value = toml::from_str(toml_str)
        .map_err(|e| TablewrightError::ConfigurationError(format!("Failed to parse TOML: {e}")))?;
    merge_over_defaults(toml_to_json(toml_value), "TOML")
}

/// Loads settings from a TOML file.
pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Settings, TablewrightError> {
    from_toml_str(&read_config(path.as_ref())?)
}

/// Loads settings from a TOML file and then applies environment overrides.
pub fn from_toml_file_with_env(path: impl AsRef<Path>) -> Result<Settings, TablewrightError> {
    let mut settings = from_toml_file(path)?;
    apply_env_overrides(&mut settings);
    Ok(settings)
}

/// Loads settings from a JSON string. Keys not present keep their defaults.
pub fn from_json_str(json_str: &str) -> Result<Settings, TablewrightError> {
    let json_value: serde_json::Value = serde_json::from_str(json_str)
        .map_err(|e| TablewrightError::ConfigurationError(format!("Failed to parse JSON: {e}")))?;
    merge_over_defaults(json_value, "JSON")
}

/// Loads settings from just environment variables (starting from defaults).
pub fn from_env() -> Settings {
    let mut settings = Settings::default();
    apply_env_overrides(&mut settings);
    settings
}

/// Applies `TABLEWRIGHT_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut Settings) {
    apply_overrides_from(settings, |key| std::env::var(key).ok());
}

/// Applies overrides read through `lookup`, which maps an environment
/// variable name to its value.
pub fn apply_overrides_from<F>(settings: &mut Settings, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(val) = lookup("TABLEWRIGHT_DEBUG") {
        settings.debug = matches!(val.to_lowercase().as_str(), "true" | "1" | "yes");
    }

    if let Some(val) = lookup("TABLEWRIGHT_LOG_LEVEL") {
        settings.log_level = val;
    }

    if let Some(val) = lookup("TABLEWRIGHT_DIALECT") {
        settings.dialect = val.to_lowercase();
    }

    if let Some(val) = lookup("TABLEWRIGHT_DATABASE_URL") {
        settings.database.url = Some(val).filter(|url| !url.is_empty());
    }

    if let Some(val) = lookup("TABLEWRIGHT_DATABASE_NAME") {
        settings.database.name = val;
    }

    if let Some(val) = lookup("TABLEWRIGHT_MIGRATIONS_ROOT") {
        settings.migrations_root = PathBuf::from(val);
    }

    if let Some(val) = lookup("TABLEWRIGHT_STATEMENT_TIMEOUT") {
        match val.parse::<u64>() {
            Ok(secs) => settings.statement_timeout_secs = secs,
            Err(_) => tracing::warn!(value = %val, "ignoring non-numeric TABLEWRIGHT_STATEMENT_TIMEOUT"),
        }
    }
}

// ============================================================
// Helpers
// ============================================================

fn read_config(path: &Path) -> Result<String, TablewrightError> {
    std::fs::read_to_string(path).map_err(|e| {
        TablewrightError::ConfigurationError(format!(
            "Failed to read settings file '{}': {e}",
            path.display()
        ))
    })
}

fn merge_over_defaults(
    overrides: serde_json::Value,
    format: &str,
) -> Result<Settings, TablewrightError> {
    let defaults = serde_json::to_value(Settings::default()).map_err(|e| {
        TablewrightError::SerializationError(format!("Failed to serialize default settings: {e}"))
    })?;
    serde_json::from_value(merge_json(defaults, overrides)).map_err(|e| {
        TablewrightError::ConfigurationError(format!("Invalid settings in {format}: {e}"))
    })
}

fn toml_to_json(value: toml::Value) -> serde_json::Value {
    match value {
        toml::Value::String(s) => serde_json::Value::String(s),
        toml::Value::Integer(i) => serde_json::json!(i),
        toml::Value::Float(f) => serde_json::json!(f),
        toml::Value::Boolean(b) => serde_json::Value::Bool(b),
        toml::Value::Datetime(dt) => serde_json::Value::String(dt.to_string()),
        toml::Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(toml_to_json).collect())
        }
        toml::Value::Table(table) => serde_json::Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}

/// Deep-merges `overlay` into `base`; objects merge key by key, anything else
/// is replaced.
fn merge_json(base: serde_json::Value, overlay: serde_json::Value) -> serde_json::Value {
    match (base, overlay) {
        (serde_json::Value::Object(mut base_map), serde_json::Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => value,
                };
                base_map.insert(key, merged);
            }
            serde_json::Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}
