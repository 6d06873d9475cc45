//! Runtime settings.
//!
//! Settings come from `<data_dir>/config.json` when it exists and are then
//! overridden by environment variables:
//!
//! - `FIRMTASK_HOME`   data directory (default `$HOME/.firmtask`)
//! - `FIRMTASK_TENANT` tenant opened when no `--tenant`/`--db` is given
//! - `FIRMTASK_USER`   user id treated as "me" by task lists
//! - `FIRMTASK_LOG`    log level: error, warn, info, debug or trace

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{FirmError, Result};
use crate::recurrence::RecurrencePolicy;

pub const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub default_tenant: Option<String>,
    pub current_user_id: Option<u64>,
    pub log_level: String,
    pub recurrence_lead_days: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            data_dir: PathBuf::from("."),
            default_tenant: None,
            current_user_id: None,
            log_level: "warn".to_string(),
            recurrence_lead_days: 0,
        }
    }
}

impl Settings {
    /// Load settings from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_sources(|key| std::env::var(key).ok())
    }

    /// Load settings using `env` to look up variables.
    pub fn from_sources(env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let data_dir = match env("FIRMTASK_HOME") {
            Some(dir) => PathBuf::from(dir),
            None => PathBuf::from(env("HOME").unwrap_or_else(|| ".".to_string())).join(".firmtask"),
        };

        let mut settings = Self::read_file(&data_dir)?;
        settings.data_dir = data_dir;

        if let Some(tenant) = env("FIRMTASK_TENANT").filter(|t| !t.trim().is_empty()) {
            settings.default_tenant = Some(tenant);
        }
        if let Some(user) = env("FIRMTASK_USER") {
            let id = user
                .trim()
                .parse::<u64>()
                .map_err(|_| FirmError::Config(format!("FIRMTASK_USER must be a user id, got '{}'", user)))?;
            settings.current_user_id = Some(id);
        }
        if let Some(level) = env("FIRMTASK_LOG") {
            settings.log_level = level;
        }
        settings.level()?;
        Ok(settings)
    }

    fn read_file(data_dir: &Path) -> Result<Self> {
        let path = data_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Settings::default());
        }
        let raw = fs::read_to_string(&path)?;
        serde_json::from_str(&raw)
            .map_err(|e| FirmError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn level(&self) -> Result<Level> {
        self.log_level
            .trim()
            .parse::<Level>()
            .map_err(|_| FirmError::Config(format!("unknown log level '{}'", self.log_level)))
    }

    pub fn recurrence_policy(&self) -> RecurrencePolicy {
        RecurrencePolicy { lead_days: self.recurrence_lead_days }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().to_string_lossy().to_string();
        let settings = Settings::from_sources(env_of(&[("HOME", &home)])).unwrap();
        assert_eq!(settings.data_dir, dir.path().join(".firmtask"));
        assert_eq!(settings.level().unwrap(), Level::WARN);
        assert_eq!(settings.recurrence_policy(), RecurrencePolicy { lead_days: 0 });
    }

    #[test]
    fn test_file_then_env_overrides() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"{ "default_tenant": "north", "recurrence_lead_days": 14, "log_level": "info" }"#,
        )
        .unwrap();
        let home = dir.path().to_string_lossy().to_string();

        let settings = Settings::from_sources(env_of(&[("FIRMTASK_HOME", &home)])).unwrap();
        assert_eq!(settings.default_tenant.as_deref(), Some("north"));
        assert_eq!(settings.recurrence_lead_days, 14);
        assert_eq!(settings.level().unwrap(), Level::INFO);

        let settings = Settings::from_sources(env_of(&[
            ("FIRMTASK_HOME", &home),
            ("FIRMTASK_TENANT", "south"),
            ("FIRMTASK_USER", "7"),
            ("FIRMTASK_LOG", "debug"),
        ]))
        .unwrap();
        assert_eq!(settings.default_tenant.as_deref(), Some("south"));
        assert_eq!(settings.current_user_id, Some(7));
        assert_eq!(settings.level().unwrap(), Level::DEBUG);
    }

    #[test]
    fn test_bad_values_are_config_errors() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().to_string_lossy().to_string();
        let err = Settings::from_sources(env_of(&[("FIRMTASK_HOME", &home), ("FIRMTASK_USER", "me")]));
        assert!(matches!(err, Err(FirmError::Config(_))));
        let err = Settings::from_sources(env_of(&[("FIRMTASK_HOME", &home), ("FIRMTASK_LOG", "loud")]));
        assert!(matches!(err, Err(FirmError::Config(_))));
    }
}
