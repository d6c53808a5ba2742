//! Configuration file support for Nursery.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/nursery/config.toml`.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub timer: TimerConfig,

    #[serde(default)]
    pub reminders: ReminderConfig,
}

/// Data storage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Sleep timer configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Seconds between notification refreshes while a timer runs
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl TimerConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

/// Reminder timing configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReminderConfig {
    #[serde(default = "default_feeding_interval_hours")]
    pub feeding_interval_hours: u32,

    /// Minutes before a predicted nap that the sleep reminder fires
    #[serde(default = "default_sleep_lead_minutes")]
    pub sleep_lead_minutes: i64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            feeding_interval_hours: default_feeding_interval_hours(),
            sleep_lead_minutes: default_sleep_lead_minutes(),
        }
    }
}

// Default value functions
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/share")))
        .unwrap_or_else(|| PathBuf::from("."));
    base.join("nursery")
}

fn default_refresh_interval_secs() -> u64 {
    30
}

fn default_feeding_interval_hours() -> u32 {
    3
}

fn default_sleep_lead_minutes() -> i64 {
    10
}

/// Environment variable naming an alternate config file
pub const CONFIG_ENV: &str = "NURSERY_CONFIG";

impl Config {
    /// Load configuration from the standard config path
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Reject settings that would make the services misbehave
    pub fn validate(&self) -> Result<()> {
        if self.timer.refresh_interval_secs == 0 {
            return Err(Error::Config(
                "timer.refresh_interval_secs must be at least 1".into(),
            ));
        }
        if self.reminders.feeding_interval_hours == 0 {
            return Err(Error::Config(
                "reminders.feeding_interval_hours must be at least 1".into(),
            ));
        }
        if self.reminders.sleep_lead_minutes < 0 {
            return Err(Error::Config(
                "reminders.sleep_lead_minutes cannot be negative".into(),
            ));
        }
        Ok(())
    }

    /// Config file location: `$NURSERY_CONFIG`, else `<config dir>/nursery/config.toml`
    pub fn default_config_path() -> PathBuf {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return PathBuf::from(path);
        }
        let base = dirs::config_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".config")))
            .unwrap_or_else(|| PathBuf::from("."));
        base.join("nursery").join("config.toml")
    }

    /// Render as TOML, the same form `load_from` reads
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {}", e)))
    }

    /// Write this config to `path` unless a file is already there
    ///
    /// Returns whether the file was written.
    pub fn write_if_missing(&self, path: &Path) -> Result<bool> {
        if path.exists() {
            return Ok(false);
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_toml()?)?;
        tracing::info!("Wrote config to {:?}", path);
        Ok(true)
    }
}

/// On-disk locations derived from the data directory
#[derive(Clone, Debug)]
pub struct DataPaths {
    pub root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn active_timer(&self) -> PathBuf {
        self.root.join("timer").join("active_timer.json")
    }

    pub fn notification_settings(&self) -> PathBuf {
        self.root.join("settings").join("notification_settings.json")
    }

    pub fn notification_spool(&self) -> PathBuf {
        self.root.join("notifications").join("spool.json")
    }

    pub fn sleep_log(&self) -> PathBuf {
        self.root.join("log").join("sleep.jsonl")
    }
}
