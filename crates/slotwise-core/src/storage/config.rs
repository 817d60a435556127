//! TOML-based application configuration.
//!
//! Stores:
//! - Solver settings (slot granularity, recurrence horizon, policies)
//! - Storage settings (database file name)
//!
//! Configuration is stored at `~/.config/slotwise/config.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::data_dir;
use crate::error::ConfigError;
use crate::scheduler::{RecurrencePolicy, SolverConfig};

/// Placement settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Spacing of candidate start times
    #[serde(default = "default_granularity")]
    pub slot_granularity_minutes: u32,
    /// How far recurring events expand on creation
    #[serde(default = "default_horizon_days")]
    pub default_horizon_days: u32,
    #[serde(default = "default_creation_policy")]
    pub creation_policy: RecurrencePolicy,
    /// Search outside the preferred window once the window is full.
    #[serde(default)]
    pub allow_window_fallback: bool,
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// File name of the SQLite database inside the data directory
    #[serde(default = "default_database_file")]
    pub database_file: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/slotwise/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

// Default functions
fn default_granularity() -> u32 {
    15
}
fn default_horizon_days() -> u32 {
    30
}
fn default_creation_policy() -> RecurrencePolicy {
    RecurrencePolicy::AllOrNothing
}
fn default_database_file() -> String {
    "slotwise.db".into()
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            slot_granularity_minutes: default_granularity(),
            default_horizon_days: default_horizon_days(),
            creation_policy: default_creation_policy(),
            allow_window_fallback: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_file: default_database_file(),
        }
    }
}

impl SchedulerConfig {
    /// Validated solver settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the granularity is outside 1..=1440 minutes or the
    /// horizon is zero.
    pub fn solver_config(&self) -> Result<SolverConfig, ConfigError> {
        if !(1..=1440).contains(&self.slot_granularity_minutes) {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.slot_granularity_minutes".into(),
                message: format!("{} is not between 1 and 1440", self.slot_granularity_minutes),
            });
        }
        if self.default_horizon_days == 0 {
            return Err(ConfigError::InvalidValue {
                key: "scheduler.default_horizon_days".into(),
                message: "must be at least 1".into(),
            });
        }
        Ok(SolverConfig {
            granularity_minutes: i64::from(self.slot_granularity_minutes),
            default_horizon_days: i64::from(self.default_horizon_days),
            allow_window_fallback: self.allow_window_fallback,
        })
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let (parent_path, leaf) = match key.rsplit_once('.') {
            Some((parent, leaf)) => (Some(parent), leaf),
            None => (None, key),
        };

        let mut current = root;
        if let Some(parent_path) = parent_path {
            for part in parent_path.split('.') {
                current = current
                    .get_mut(part)
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
            }
        }

        let obj = current
            .as_object_mut()
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        let existing = obj
            .get(leaf)
            .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

        let new_value = match existing {
            serde_json::Value::Bool(_) => serde_json::Value::Bool(
                value
                    .parse::<bool>()
                    .map_err(|e| invalid(e.to_string()))?,
            ),
            serde_json::Value::Number(_) => serde_json::Value::Number(
                value
                    .parse::<u64>()
                    .map_err(|_| invalid(format!("cannot parse '{value}' as a whole number")))?
                    .into(),
            ),
            serde_json::Value::Object(_) => {
                return Err(invalid("cannot replace a whole section".into()));
            }
            _ => serde_json::Value::String(value.into()),
        };

        obj.insert(leaf.to_string(), new_value);
        Ok(())
    }

    fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from the data directory, writing defaults on first use.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing defaults there if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(err) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }

    /// Persist to the data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key, in memory. Call [`Config::save`] to persist.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value does not parse as
    /// the key's type (including unknown policy names).
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        let updated: Config = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        updated.scheduler.solver_config()?;
        *self = updated;
        Ok(())
    }

    /// Flattened `key = value` pairs in dot-path form.
    pub fn entries(&self) -> Vec<(String, String)> {
        fn walk(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
            match value {
                serde_json::Value::Object(map) => {
                    for (k, v) in map {
                        let key = if prefix.is_empty() {
                            k.clone()
                        } else {
                            format!("{prefix}.{k}")
                        };
                        walk(&key, v, out);
                    }
                }
                serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
                other => out.push((prefix.to_string(), other.to_string())),
            }
        }

        let mut out = Vec::new();
        if let Ok(json) = serde_json::to_value(self) {
            walk("", &json, &mut out);
        }
        out.sort();
        out
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.scheduler.slot_granularity_minutes, 15);
        assert_eq!(parsed.scheduler.creation_policy, RecurrencePolicy::AllOrNothing);
        assert_eq!(parsed.storage.database_file, "slotwise.db");
    }

    #[test]
    fn missing_sections_take_defaults() {
        let parsed: Config = toml::from_str("[scheduler]\nallow_window_fallback = true\n").unwrap();
        assert!(parsed.scheduler.allow_window_fallback);
        assert_eq!(parsed.scheduler.default_horizon_days, 30);
        assert_eq!(parsed.storage.database_file, "slotwise.db");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("scheduler.slot_granularity_minutes").as_deref(), Some("15"));
        assert_eq!(cfg.get("scheduler.creation_policy").as_deref(), Some("all_or_nothing"));
        assert_eq!(cfg.get("scheduler.allow_window_fallback").as_deref(), Some("false"));
        assert!(cfg.get("scheduler.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("scheduler.slot_granularity_minutes", "5").unwrap();
        cfg.set("scheduler.allow_window_fallback", "true").unwrap();
        cfg.set("scheduler.creation_policy", "best_effort").unwrap();
        assert_eq!(cfg.scheduler.slot_granularity_minutes, 5);
        assert!(cfg.scheduler.allow_window_fallback);
        assert_eq!(cfg.scheduler.creation_policy, RecurrencePolicy::BestEffort);
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("scheduler.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
        assert!(matches!(cfg.set("nope.deeper", "1"), Err(ConfigError::UnknownKey(_))));
    }

    #[test]
    fn set_rejects_invalid_values_and_keeps_old_config() {
        let mut cfg = Config::default();
        assert!(cfg.set("scheduler.allow_window_fallback", "maybe").is_err());
        assert!(cfg.set("scheduler.creation_policy", "sometimes").is_err());
        assert!(cfg.set("scheduler.slot_granularity_minutes", "0").is_err());
        assert!(cfg.set("scheduler", "x").is_err());
        assert_eq!(cfg.scheduler.slot_granularity_minutes, 15);
        assert_eq!(cfg.scheduler.creation_policy, RecurrencePolicy::AllOrNothing);
    }

    #[test]
    fn solver_config_carries_scheduler_section() {
        let mut cfg = Config::default();
        cfg.scheduler.slot_granularity_minutes = 1;
        cfg.scheduler.default_horizon_days = 7;
        let solver = cfg.scheduler.solver_config().unwrap();
        assert_eq!(solver.granularity_minutes, 1);
        assert_eq!(solver.default_horizon_days, 7);
        assert!(!solver.allow_window_fallback);
    }

    #[test]
    fn entries_are_flattened_and_sorted() {
        let entries = Config::default().entries();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "scheduler.allow_window_fallback",
                "scheduler.creation_policy",
                "scheduler.default_horizon_days",
                "scheduler.slot_granularity_minutes",
                "storage.database_file",
            ]
        );
    }

    #[test]
    fn load_from_writes_defaults_then_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let first = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(first.scheduler.default_horizon_days, 30);

        let mut changed = first.clone();
        changed.set("scheduler.default_horizon_days", "14").unwrap();
        changed.save_to(&path).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().scheduler.default_horizon_days, 14);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[scheduler\nbroken").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::LoadFailed { .. })));
    }
}
