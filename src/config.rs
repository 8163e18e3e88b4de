/// Import configuration.
///
/// Loaded from a TOML file; every field has a default so an empty file
/// (or no file at all) yields a working configuration.
///
/// ```toml
/// max_visit_span_hours = 36
/// log_level = "info"
/// log_file = "/var/log/fieldvisit/import.log"
/// console_timestamps = true
/// ```

use crate::logging::LogLevel;
use crate::model::ImportError;
use chrono::Duration;
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Visits longer than this are reported as a data-quality warning.
pub const DEFAULT_MAX_VISIT_SPAN_HOURS: i64 = 36;

/// Environment variable naming the config file used by the CLI.
pub const CONFIG_PATH_ENV: &str = "FIELDVISIT_CONFIG";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImportConfig {
    pub max_visit_span_hours: i64,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub console_timestamps: bool,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            max_visit_span_hours: DEFAULT_MAX_VISIT_SPAN_HOURS,
            log_level: LogLevel::Info,
            log_file: None,
            console_timestamps: false,
        }
    }
}

impl ImportConfig {
    /// Saturates at `Duration::MAX` for hour counts chrono cannot represent.
    pub fn max_visit_span(&self) -> Duration {
        Duration::try_hours(self.max_visit_span_hours).unwrap_or(Duration::MAX)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ImportError> {
        let config: ImportConfig =
            toml::from_str(contents).map_err(|e| ImportError::Config(e.to_string()))?;

        if config.max_visit_span_hours <= 0 {
            return Err(ImportError::Config(format!(
                "max_visit_span_hours must be positive, got {}",
                config.max_visit_span_hours
            )));
        }

        if Duration::try_hours(config.max_visit_span_hours).is_none() {
            return Err(ImportError::Config(format!(
                "max_visit_span_hours is out of range, got {}",
                config.max_visit_span_hours
            )));
        }

        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ImportError> {
        let contents = fs::read_to_string(path)
            .map_err(|e| ImportError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&contents)
    }
}
