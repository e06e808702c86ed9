//! Application configuration.
//!
//! Aggregates the per-worker sections into a single Config struct that can
//! be loaded from YAML files or environment variables. Every field has a
//! default, so an empty file (or none at all) is a valid configuration;
//! only the Adafruit IO credentials must be supplied for the bridge to run.

mod broker;
mod runtime;
mod sources;

use std::time::Duration;

use serde::Deserialize;

pub use broker::{CloudConfig, LocalBrokerConfig, ThrottleConfig};
pub use runtime::{CommandsConfig, ScheduleConfig, SupervisorConfig};
pub use sources::{BaysConfig, EnergyConfig, WeatherConfig};

/// Default configuration file name.
pub const DEFAULT_CONFIG_FILE: &str = "adabridge.yaml";
/// Environment variable for configuration file path.
pub const CONFIG_ENV_VAR: &str = "ADABRIDGE_CONFIG";
/// Prefix for configuration environment variables.
pub const CONFIG_ENV_PREFIX: &str = "ADABRIDGE";

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Main application configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Local MQTT broker connection.
    pub local: LocalBrokerConfig,
    /// Adafruit IO connection (MQTT and REST).
    pub cloud: CloudConfig,
    /// Adafruit IO throttle/error notifier connection.
    pub throttle: ThrottleConfig,
    /// OpenWeatherMap polling source.
    pub weather: WeatherConfig,
    /// Sense energy monitor polling source.
    pub energy: EnergyConfig,
    /// Parking-bay status file polling source.
    pub bays: BaysConfig,
    /// Event queue and liveness sweep.
    pub supervisor: SupervisorConfig,
    /// Periodic job timings.
    pub schedule: ScheduleConfig,
    /// Local command topic actions.
    pub commands: CommandsConfig,
}

impl Config {
    /// Load configuration from file and environment.
    ///
    /// Configuration sources (in order of priority, later overrides earlier):
    /// 1. `adabridge.yaml` in current directory (if exists)
    /// 2. File specified by `path` argument (if provided)
    /// 3. File specified by `CONFIG_ENV_VAR` environment variable (if set)
    /// 4. Environment variables with `CONFIG_ENV_PREFIX` prefix, `__` separated
    ///    (e.g. `ADABRIDGE__CLOUD__KEY`)
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        use ::config::{Config as ConfigLib, Environment, File, FileFormat};

        let mut builder = ConfigLib::builder()
            .add_source(File::new(DEFAULT_CONFIG_FILE, FileFormat::Yaml).required(false));

        if let Some(config_path) = path {
            builder = builder.add_source(File::new(config_path, FileFormat::Yaml).required(true));
        }

        if let Ok(config_path) = std::env::var(CONFIG_ENV_VAR) {
            builder = builder.add_source(File::new(&config_path, FileFormat::Yaml).required(true));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(CONFIG_ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the bridge cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cloud.username.is_empty() || self.cloud.key.is_empty() {
            return Err(ConfigError::Invalid(
                "cloud.username and cloud.key are required".to_string(),
            ));
        }
        if self.local.qos > 2 {
            return Err(ConfigError::Invalid(format!(
                "local.qos must be 0, 1 or 2, got {}",
                self.local.qos
            )));
        }
        let durations = [
            ("local.publish_timeout_secs", self.local.publish_timeout_secs),
            ("cloud.publish_timeout_secs", self.cloud.publish_timeout_secs),
            ("cloud.fetch_timeout_secs", self.cloud.fetch_timeout_secs),
            ("cloud.teardown_timeout_secs", self.cloud.teardown_timeout_secs),
            ("weather.request_timeout_secs", self.weather.request_timeout_secs),
            ("weather.timeout_secs", self.weather.timeout_secs),
            ("energy.request_timeout_secs", self.energy.request_timeout_secs),
            ("energy.realtime_timeout_secs", self.energy.realtime_timeout_secs),
            ("energy.timeout_secs", self.energy.timeout_secs),
        ];
        for (name, secs) in durations {
            if Duration::try_from_secs_f64(secs).is_err() {
                return Err(ConfigError::Invalid(format!(
                    "{} must be a finite, non-negative number of seconds, got {}",
                    name, secs
                )));
            }
        }
        Ok(())
    }

    /// Create config for testing.
    pub fn for_test() -> Self {
        let mut config = Self::default();
        config.cloud.username = "tester".to_string();
        config.cloud.key = "aio_test_key".to_string();
        config
    }
}

#[cfg(test)]
mod tests;
