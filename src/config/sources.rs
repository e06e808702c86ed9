//! Polling source configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// OpenWeatherMap current-weather source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    /// API key. Source disabled when unset.
    pub api_key: Option<String>,
    /// City id. Source disabled when unset.
    pub city_id: Option<String>,
    /// Current weather endpoint.
    pub url: String,
    /// Seconds between polls.
    pub interval_secs: u64,
    /// HTTP request timeout.
    pub request_timeout_secs: f64,
    /// Hard timeout for the whole fetch.
    pub timeout_secs: f64,
    /// Command queue capacity.
    pub queue_size: usize,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            city_id: None,
            url: "http://api.openweathermap.org/data/2.5/weather".to_string(),
            interval_secs: 3606,
            request_timeout_secs: 15.0,
            timeout_secs: 18.9,
            queue_size: 100,
        }
    }
}

impl WeatherConfig {
    pub fn enabled(&self) -> bool {
        self.api_key.is_some() && self.city_id.is_some()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }
}

/// Sense energy monitor source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnergyConfig {
    /// Account e-mail. Source disabled when unset.
    pub username: Option<String>,
    /// Account password. Source disabled when unset.
    pub password: Option<String>,
    /// REST API base URL (with trailing slash).
    pub api_url: String,
    /// Realtime feed base URL (with trailing slash). The monitor id and
    /// `/realtimefeed` are appended.
    pub realtime_url: String,
    /// Seconds between polls.
    pub interval_secs: u64,
    /// HTTP request timeout.
    pub request_timeout_secs: f64,
    /// Timeout for reading one update off the realtime feed.
    pub realtime_timeout_secs: f64,
    /// Hard timeout for the whole fetch.
    pub timeout_secs: f64,
    /// Pause between emitted readings, in milliseconds.
    pub emit_spacing_ms: u64,
    /// Command queue capacity.
    pub queue_size: usize,
}

impl Default for EnergyConfig {
    fn default() -> Self {
        Self {
            username: None,
            password: None,
            api_url: "https://api.sense.com/apiservice/api/v1/".to_string(),
            realtime_url: "wss://clientrt.sense.com/monitors/".to_string(),
            interval_secs: 601,
            request_timeout_secs: 10.0,
            realtime_timeout_secs: 10.0,
            timeout_secs: 28.9,
            emit_spacing_ms: 500,
            queue_size: 100,
        }
    }
}

impl EnergyConfig {
    pub fn enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.request_timeout_secs)
    }

    pub fn realtime_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.realtime_timeout_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn emit_spacing(&self) -> Duration {
        Duration::from_millis(self.emit_spacing_ms)
    }
}

/// Parking-bay status file source.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BaysConfig {
    /// Whether the source runs at all.
    pub enabled: bool,
    /// Status document written by the bay scraper.
    pub file: PathBuf,
    /// Seconds between reads.
    pub interval_secs: u64,
    /// Re-emit an unchanged document when its mtime moved by more than this.
    pub stale_mtime_secs: u64,
    /// Command queue capacity.
    pub queue_size: usize,
}

impl Default for BaysConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            file: PathBuf::from("/vagrant/evbays/sema.json"),
            interval_secs: 10,
            stale_mtime_secs: 60,
            queue_size: 100,
        }
    }
}

impl BaysConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn stale_mtime(&self) -> Duration {
        Duration::from_secs(self.stale_mtime_secs)
    }
}
