//! Configuration loading from TOML files and environment variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::timer::TimerBackend;

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Inactivity tracking configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Milliseconds without activity before the user counts as inactive.
    #[serde(default = "default_time_for_inactivity_ms")]
    pub time_for_inactivity_ms: u64,
    /// Whether tracking starts enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Initial activity flag; unset means active.
    #[serde(default)]
    pub initial_active: Option<bool>,
    /// Gestures never reset the timer.
    #[serde(default)]
    pub ignore_gestures: bool,
    /// Keyboard show/hide never resets the timer.
    #[serde(default)]
    pub skip_keyboard: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            time_for_inactivity_ms: default_time_for_inactivity_ms(),
            enabled: true,
            initial_active: None,
            ignore_gestures: false,
            skip_keyboard: false,
        }
    }
}

impl TrackerConfig {
    pub fn time_for_inactivity(&self) -> Duration {
        Duration::from_millis(self.time_for_inactivity_ms)
    }
}

/// Timer backend selection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimerConfig {
    #[serde(default)]
    pub backend: TimerBackend,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// Default value functions
fn default_time_for_inactivity_ms() -> u64 {
    10_000
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("user-inactivity/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.is_file() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `INACTIVITY_*` overrides looked up through `var`.
    pub fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(val) = var("INACTIVITY_TIME_MS") {
            self.tracker.time_for_inactivity_ms = parse_var("INACTIVITY_TIME_MS", &val)?;
        }
        if let Some(val) = var("INACTIVITY_ENABLED") {
            self.tracker.enabled = parse_var("INACTIVITY_ENABLED", &val)?;
        }
        if let Some(val) = var("INACTIVITY_IGNORE_GESTURES") {
            self.tracker.ignore_gestures = parse_var("INACTIVITY_IGNORE_GESTURES", &val)?;
        }
        if let Some(val) = var("INACTIVITY_SKIP_KEYBOARD") {
            self.tracker.skip_keyboard = parse_var("INACTIVITY_SKIP_KEYBOARD", &val)?;
        }
        if let Some(val) = var("INACTIVITY_TIMER_BACKEND") {
            self.timer.backend = val.parse()?;
        }
        if let Some(val) = var("INACTIVITY_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = var("INACTIVITY_LOG_FORMAT") {
            self.logging.format = match val.to_ascii_lowercase().as_str() {
                "json" => LogFormat::Json,
                "text" => LogFormat::Text,
                _ => {
                    return Err(Error::InvalidConfig(format!(
                        "INACTIVITY_LOG_FORMAT must be \"text\" or \"json\", got {val:?}"
                    )))
                }
            };
        }
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.tracker.time_for_inactivity_ms == 0 {
            return Err(Error::InvalidConfig(
                "time_for_inactivity_ms must be greater than 0".to_string(),
            ));
        }
        if self.logging.level.trim().is_empty() {
            return Err(Error::InvalidConfig("log level cannot be empty".to_string()));
        }
        Ok(())
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, val: &str) -> Result<T> {
    val.trim()
        .parse()
        .map_err(|_| Error::InvalidConfig(format!("{key} has an invalid value: {val:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;
    use tokio_test::{assert_err, assert_ok};

    #[test]
    fn defaults_match_component_defaults() {
        let config = Config::default();
        assert_eq!(config.tracker.time_for_inactivity(), Duration::from_millis(10_000));
        assert!(config.tracker.enabled);
        assert_eq!(config.tracker.initial_active, None);
        assert!(!config.tracker.ignore_gestures);
        assert!(!config.tracker.skip_keyboard);
        assert_eq!(config.timer.backend, TimerBackend::Foreground);
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_ok!(config.validate());
    }

    #[test]
    fn loads_partial_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[tracker]\ntime_for_inactivity_ms = 5000\nskip_keyboard = true\n\n[timer]\nbackend = \"background\"\n"
        )
        .unwrap();

        let config = assert_ok!(Config::from_file(file.path()));
        assert_eq!(config.tracker.time_for_inactivity_ms, 5000);
        assert!(config.tracker.skip_keyboard);
        assert!(config.tracker.enabled);
        assert_eq!(config.timer.backend, TimerBackend::Background);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn missing_file_and_bad_toml_are_errors() {
        assert!(matches!(
            Config::from_file("/definitely/not/here.toml"),
            Err(Error::ReadConfig { .. })
        ));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[tracker\ntime_for_inactivity_ms = ").unwrap();
        assert!(matches!(Config::from_file(file.path()), Err(Error::ParseConfig(_))));
    }

    #[test]
    fn zero_duration_fails_validation() {
        let mut config = Config::default();
        config.tracker.time_for_inactivity_ms = 0;
        assert_err!(config.validate());
    }

    #[test]
    fn overrides_replace_file_values() {
        let vars: HashMap<&str, &str> = [
            ("INACTIVITY_TIME_MS", "2500"),
            ("INACTIVITY_ENABLED", "false"),
            ("INACTIVITY_TIMER_BACKEND", "background"),
            ("INACTIVITY_LOG_FORMAT", "JSON"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        assert_ok!(config.apply_overrides(|key| vars.get(key).map(|v| v.to_string())));

        assert_eq!(config.tracker.time_for_inactivity_ms, 2500);
        assert!(!config.tracker.enabled);
        assert_eq!(config.timer.backend, TimerBackend::Background);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn malformed_override_is_rejected() {
        let mut config = Config::default();
        assert_err!(config.apply_overrides(|key| {
            (key == "INACTIVITY_TIME_MS").then(|| "soon".to_string())
        }));
    }
}
