//! Configuration management for preflight.
//!
//! Configuration loading and validation using figment, supporting TOML config
//! files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use chrono::FixedOffset;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "preflight";

/// Default queue database file name.
const QUEUE_DB_FILE_NAME: &str = "queue.db";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `PREFLIGHT_`)
/// 2. TOML config file at `~/.config/preflight/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local storage configuration.
    pub storage: StorageConfig,
    /// Offline sync queue configuration.
    pub sync: SyncConfig,
    /// Flight tracking configuration.
    pub tracking: TrackingConfig,
    /// Weather provider configuration.
    pub weather: WeatherConfig,
    /// Schedule resolution configuration.
    pub schedule: ScheduleConfig,
}

/// Local storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the offline queue database file.
    /// Defaults to `~/.local/share/preflight/queue.db`
    pub queue_db_path: Option<PathBuf>,
}

/// Offline sync queue configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between queue flush attempts, in seconds.
    pub flush_interval_secs: u64,
    /// Interval between connectivity probes, in seconds.
    pub probe_interval_secs: u64,
}

/// Flight tracking configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Interval between progress/overdue recomputations, in seconds.
    pub recompute_interval_secs: u64,
    /// Hours an arrived flight stays on the active board before being
    /// filtered from default views.
    pub arrived_retention_hours: u32,
}

/// Weather provider configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// Base URL of the weather data endpoint.
    pub provider_url: String,
    /// Quiet period before a debounced weather fetch fires, in milliseconds.
    pub debounce_ms: u64,
    /// Observations older or newer than this many minutes relative to the
    /// flight time are not considered current.
    pub observation_window_minutes: i64,
    /// HTTP request timeout, in seconds.
    pub request_timeout_secs: u64,
}

/// Schedule resolution configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// IANA timezone of the operator's home base, applied to local wall-clock
    /// departure times.
    pub home_timezone: String,
    /// UTC offset in minutes used when the named timezone cannot be resolved.
    ///
    /// Results computed with this offset are marked reduced-accuracy; the
    /// offset ignores daylight saving.
    pub fallback_utc_offset_minutes: i32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval_secs: 30,
            probe_interval_secs: 15,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            recompute_interval_secs: 60,
            arrived_retention_hours: 24,
        }
    }
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            provider_url: "https://aviationweather.gov/api/data".to_string(),
            debounce_ms: 400,
            observation_window_minutes: 90,
            request_timeout_secs: 10,
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            home_timezone: "America/Los_Angeles".to_string(),
            fallback_utc_offset_minutes: -480,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `PREFLIGHT_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file).nested())
            .merge(Env::prefixed("PREFLIGHT_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sync.flush_interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "flush_interval_secs must be greater than 0".to_string(),
            });
        }

        if self.sync.probe_interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "probe_interval_secs must be greater than 0".to_string(),
            });
        }

        if self.tracking.recompute_interval_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "recompute_interval_secs must be greater than 0".to_string(),
            });
        }

        if self.weather.provider_url.is_empty() {
            return Err(Error::ConfigValidation {
                message: "provider_url must not be empty".to_string(),
            });
        }

        if self.weather.observation_window_minutes < 0 {
            return Err(Error::ConfigValidation {
                message: "observation_window_minutes must not be negative".to_string(),
            });
        }

        if self.schedule.home_timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("unknown timezone: {}", self.schedule.home_timezone),
            });
        }

        // UTC offsets beyond +/-18h do not exist
        if self.schedule.fallback_utc_offset_minutes.abs() > 18 * 60 {
            return Err(Error::ConfigValidation {
                message: format!(
                    "fallback_utc_offset_minutes out of range: {}",
                    self.schedule.fallback_utc_offset_minutes
                ),
            });
        }

        Ok(())
    }

    /// Get the queue database path, resolving defaults if not set.
    #[must_use]
    pub fn queue_db_path(&self) -> PathBuf {
        self.storage
            .queue_db_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(QUEUE_DB_FILE_NAME))
    }

    /// Get the queue flush interval as a Duration.
    #[must_use]
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.sync.flush_interval_secs)
    }

    /// Get the connectivity probe interval as a Duration.
    #[must_use]
    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.sync.probe_interval_secs)
    }

    /// Get the tracking recompute interval as a Duration.
    #[must_use]
    pub fn recompute_interval(&self) -> Duration {
        Duration::from_secs(self.tracking.recompute_interval_secs)
    }

    /// Get the arrived-flight retention window.
    #[must_use]
    pub fn arrived_retention(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.tracking.arrived_retention_hours))
    }

    /// Get the weather fetch debounce quiet period as a Duration.
    #[must_use]
    pub fn weather_debounce(&self) -> Duration {
        Duration::from_millis(self.weather.debounce_ms)
    }

    /// Get the observation currency window.
    #[must_use]
    pub fn observation_window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.weather.observation_window_minutes)
    }

    /// Get the weather request timeout as a Duration.
    #[must_use]
    pub fn weather_request_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.request_timeout_secs)
    }

    /// Get the fallback UTC offset as a `FixedOffset`.
    ///
    /// Validation guarantees the configured offset is in range, so the
    /// conversion only falls back to UTC for a hand-built invalid config.
    #[must_use]
    pub fn fallback_offset(&self) -> FixedOffset {
        use chrono::Offset;

        FixedOffset::east_opt(self.schedule.fallback_utc_offset_minutes * 60)
            .unwrap_or_else(|| chrono::Utc.fix())
    }
}
