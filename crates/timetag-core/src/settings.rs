use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, TimeTagError};

pub const DATABASE_FILE_NAME: &str = "timetag.db";
pub const SETTINGS_FILE_NAME: &str = "configuration.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Idle time after which the user counts as inactive.
    pub inactive_after_idle_seconds: u64,
    /// Largest gap between samples that still continues the previous entry.
    pub seconds_before_new_entry: u64,
    pub log_application_path: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            inactive_after_idle_seconds: 600,
            seconds_before_new_entry: 10,
            log_application_path: true,
        }
    }
}

impl Settings {
    /// Reads the settings file, writing the defaults first if it does not
    /// exist yet. Keys missing from an existing file take their defaults.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let settings = Self::default();
            settings.save(path)?;
            info!(path = %path.display(), "wrote default settings");
            return Ok(settings);
        }

        let contents = fs::read_to_string(path)?;
        let settings: Self = serde_json::from_str(&contents)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(self)?;
        fs::write(path, serialized)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.inactive_after_idle_seconds == 0 {
            return Err(TimeTagError::Config(
                "inactive_after_idle_seconds must be greater than zero".to_owned(),
            ));
        }
        if self.seconds_before_new_entry == 0 {
            return Err(TimeTagError::Config(
                "seconds_before_new_entry must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    /// Saturates at [`Duration::MAX`] for thresholds chrono cannot represent.
    pub fn max_delta(&self) -> Duration {
        i64::try_from(self.seconds_before_new_entry)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// `active = !locked && idle < threshold`.
    pub fn is_active(&self, idle_seconds: u64, locked: bool) -> bool {
        !locked && idle_seconds < self.inactive_after_idle_seconds
    }
}

/// Directory holding the database and the settings file.
pub fn default_data_dir() -> PathBuf {
    if let Some(local) = env::var_os("LOCALAPPDATA") {
        return PathBuf::from(local).join("TimeTag");
    }
    if let Some(config) = env::var_os("XDG_CONFIG_HOME") {
        return PathBuf::from(config).join("timetag");
    }
    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".config").join("timetag");
    }
    PathBuf::from("data")
}

pub fn default_db_path() -> PathBuf {
    default_data_dir().join(DATABASE_FILE_NAME)
}

pub fn default_settings_path() -> PathBuf {
    default_data_dir().join(SETTINGS_FILE_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_created_with_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("nested").join(SETTINGS_FILE_NAME);

        let settings = Settings::load_or_create(&path).expect("load settings");

        assert_eq!(settings, Settings::default());
        assert!(path.exists());
        let written: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written["seconds_before_new_entry"], 10);
        assert_eq!(written["inactive_after_idle_seconds"], 600);
    }

    #[test]
    fn missing_keys_take_defaults() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{ "seconds_before_new_entry": 30 }"#).unwrap();

        let settings = Settings::load_or_create(&path).expect("load settings");

        assert_eq!(settings.seconds_before_new_entry, 30);
        assert_eq!(settings.inactive_after_idle_seconds, 600);
        assert!(settings.log_application_path);
    }

    #[test]
    fn zero_thresholds_are_rejected() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join(SETTINGS_FILE_NAME);
        fs::write(&path, r#"{ "inactive_after_idle_seconds": 0 }"#).unwrap();

        let err = Settings::load_or_create(&path).unwrap_err();
        assert!(matches!(err, TimeTagError::Config(_)));
    }

    #[test]
    fn huge_new_entry_threshold_saturates() {
        let settings = Settings {
            seconds_before_new_entry: 10_000_000_000_000_000,
            ..Settings::default()
        };
        settings.validate().expect("positive thresholds are valid");
        assert_eq!(settings.max_delta(), Duration::MAX);

        let settings = Settings {
            seconds_before_new_entry: u64::MAX,
            ..Settings::default()
        };
        assert_eq!(settings.max_delta(), Duration::MAX);
        assert_eq!(Settings::default().max_delta(), Duration::seconds(10));
    }

    #[test]
    fn locked_session_is_never_active() {
        let settings = Settings::default();
        assert!(settings.is_active(0, false));
        assert!(!settings.is_active(0, true));
        assert!(!settings.is_active(600, false));
        assert!(settings.is_active(599, false));
    }
}
