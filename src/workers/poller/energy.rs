//! Sense energy monitor source.
//!
//! Each fetch reads one update off the Sense realtime websocket (current
//! power and which devices are running), then the REST trend totals and,
//! once per session, the discovered device list. Readings are emitted as
//! `/sense/data/<key>`, device states as `/sense/device/<name>`.

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use futures::StreamExt;
use serde::Deserialize;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use super::PollSource;
use crate::config::EnergyConfig;
use crate::events::{ClientId, Event, Payload};
use crate::workers::WorkerError;

/// Trend scales, smallest first.
pub const SCALES: [&str; 5] = ["HOUR", "DAY", "WEEK", "MONTH", "YEAR"];

/// Devices never reported.
const IGNORED_DEVICES: [&str; 2] = ["other", "always on"];

/// Consecutive failures tolerated before the session is rebuilt.
const MAX_FAILURES: u32 = 2;

/// Local topic prefix of energy readings.
pub const DATA_TOPIC_PREFIX: &str = "/sense/data";
/// Local topic prefix of device on/off states.
pub const DEVICE_TOPIC_PREFIX: &str = "/sense/device";

/// Solar output at or below this many watts is reported as zero.
const SOLAR_NOISE_WATTS: f64 = 2.0;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    monitors: Vec<Monitor>,
}

#[derive(Debug, Deserialize)]
struct Monitor {
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Device {
    name: String,
}

#[derive(Debug, Deserialize)]
struct FeedMessage {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
}

/// One `realtime_update` from the Sense feed.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
pub struct Realtime {
    /// Total power draw, in watts.
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub solar_w: f64,
    /// Devices currently on.
    #[serde(default)]
    pub devices: Vec<RealtimeDevice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RealtimeDevice {
    pub name: String,
}

impl Realtime {
    /// Solar output with sub-threshold noise removed.
    pub fn solar_power(&self) -> f64 {
        if self.solar_w > SOLAR_NOISE_WATTS {
            self.solar_w
        } else {
            0.0
        }
    }

    /// `active_power`, `active_solar_power` and `grid_power`, in that order.
    pub fn power_readings(&self) -> Vec<(String, f64)> {
        let solar = self.solar_power();
        vec![
            ("active_power".to_string(), self.w),
            ("active_solar_power".to_string(), solar),
            ("grid_power".to_string(), self.w - solar),
        ]
    }

    /// On/off state of every known device, in `known` order. The solar
    /// device only counts as on while it produces above the noise floor.
    pub fn device_states(&self, known: &BTreeSet<String>) -> Vec<(String, bool)> {
        let solar_on = self.solar_power() > 0.0;
        let active: BTreeSet<String> = self
            .devices
            .iter()
            .map(|device| normalize_device(&device.name))
            .filter(|name| name != "solar" || solar_on)
            .collect();
        known
            .iter()
            .map(|name| (name.clone(), active.contains(name)))
            .collect()
    }
}

/// Pull the realtime update out of one feed message. Other message types
/// (`hello`, `features`, ...) yield `None`.
pub fn parse_feed_message(text: &str) -> Result<Option<Realtime>, WorkerError> {
    let message: FeedMessage = serde_json::from_str(text)
        .map_err(|e| WorkerError::Source(format!("Bad Sense feed message: {}", e)))?;
    if message.kind != "realtime_update" {
        return Ok(None);
    }
    serde_json::from_value(message.payload)
        .map(Some)
        .map_err(|e| WorkerError::Source(format!("Bad Sense realtime update: {}", e)))
}

/// Trend documents per scale, as returned by `app/history/trends`.
#[derive(Debug, Default)]
pub struct Trends {
    by_scale: Vec<(&'static str, serde_json::Value)>,
}

impl Trends {
    pub fn insert(&mut self, scale: &'static str, document: serde_json::Value) {
        self.by_scale.retain(|(s, _)| *s != scale);
        self.by_scale.push((scale, document));
    }

    fn section(&self, scale: &str, key: &str) -> Option<&serde_json::Value> {
        self.by_scale
            .iter()
            .find(|(s, _)| *s == scale)
            .and_then(|(_, doc)| doc.get(key))
    }

    /// Raw `total` of `key` (`consumption` or `production`) for one scale.
    pub fn raw_total(&self, scale: &str, key: &str) -> f64 {
        self.section(scale, key)
            .and_then(|section| section.get("total"))
            .and_then(serde_json::Value::as_f64)
            .unwrap_or(0.0)
    }

    /// Running total the way the Sense app shows it: week and month add the
    /// current day, year adds the current month (which itself adds the day).
    pub fn total(&self, scale: &str, key: &str) -> f64 {
        if self.section(scale, key).is_none() {
            return 0.0;
        }
        let own = self.raw_total(scale, key);
        match scale {
            "WEEK" | "MONTH" => own + self.total("DAY", key),
            "YEAR" => own + self.total("MONTH", key),
            _ => own,
        }
    }
}

/// An authenticated Sense API session.
pub struct SenseSession {
    http: reqwest::Client,
    api_url: String,
    token: String,
    monitor_id: String,
}

impl SenseSession {
    pub async fn authenticate(
        http: reqwest::Client,
        api_url: &str,
        username: &str,
        password: &str,
    ) -> Result<Self, WorkerError> {
        let response = http
            .post(format!("{}authenticate", api_url))
            .form(&[("email", username), ("password", password)])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(WorkerError::Source(format!(
                "Sense authentication failed: {}",
                response.status()
            )));
        }
        let auth: AuthResponse = response.json().await?;
        let monitor = auth
            .monitors
            .first()
            .ok_or_else(|| WorkerError::Source("Sense account has no monitors".to_string()))?;
        let monitor_id = match &monitor.id {
            serde_json::Value::String(id) => id.clone(),
            other => other.to_string(),
        };
        Ok(Self {
            http,
            api_url: api_url.to_string(),
            token: auth.access_token,
            monitor_id,
        })
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, WorkerError> {
        Ok(self
            .http
            .get(format!("{}{}", self.api_url, path))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    pub async fn trends(&self) -> Result<Trends, WorkerError> {
        let start = Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .map(|midnight| midnight.format("%Y-%m-%dT%H:%M:%S").to_string())
            .unwrap_or_default();
        let mut trends = Trends::default();
        for scale in SCALES {
            let path = format!(
                "app/history/trends?monitor_id={}&scale={}&start={}",
                self.monitor_id, scale, start
            );
            trends.insert(scale, self.get(&path).await?);
        }
        Ok(trends)
    }

    /// Open the realtime feed, wait for the first update and close it again.
    pub async fn realtime(
        &self,
        feed_url: &str,
        timeout: Duration,
    ) -> Result<Realtime, WorkerError> {
        let url = format!(
            "{}{}/realtimefeed?access_token={}",
            feed_url, self.monitor_id, self.token
        );
        tokio::time::timeout(timeout, first_update(&url))
            .await
            .map_err(|_| WorkerError::Timeout(timeout))?
    }

    pub async fn device_names(&self) -> Result<Vec<String>, WorkerError> {
        let devices: Vec<Device> = self
            .get(&format!("app/monitors/{}/devices", self.monitor_id))
            .await?;
        Ok(devices.into_iter().map(|d| d.name).collect())
    }
}

async fn first_update(url: &str) -> Result<Realtime, WorkerError> {
    let (mut feed, _) = connect_async(url).await?;
    let update = loop {
        let Some(message) = feed.next().await else {
            break Err(WorkerError::Source("Sense realtime feed closed".to_string()));
        };
        let text = match message {
            Ok(Message::Text(text)) => text,
            Ok(_) => continue,
            Err(e) => break Err(e.into()),
        };
        match parse_feed_message(&text) {
            Ok(Some(update)) => break Ok(update),
            Ok(None) => debug!("Skipping Sense feed message"),
            Err(e) => break Err(e),
        }
    };
    let _ = feed.close(None).await;
    update
}

fn normalize_device(name: &str) -> String {
    name.to_lowercase().replace(' ', "_")
}

/// Device names worth reporting, normalised: lower case, spaces as `_`.
pub fn reportable_devices<I: IntoIterator<Item = String>>(names: I) -> BTreeSet<String> {
    names
        .into_iter()
        .filter(|name| !IGNORED_DEVICES.contains(&name.to_lowercase().as_str()))
        .map(|name| normalize_device(&name))
        .collect()
}

/// Yearly totals must never go backwards; a smaller value is dropped.
#[derive(Debug, Default)]
pub struct YearlyTotals {
    production: f64,
    consumption: f64,
}

impl YearlyTotals {
    /// Readings derived from `trends`, in emission order.
    pub fn readings(&mut self, trends: &Trends) -> Vec<(String, f64)> {
        let mut readings = Vec::new();

        let production = trends.total("YEAR", "production");
        if self.production > production {
            warn!(new = production, old = self.production, "Skipping backwards yearly_production");
        } else {
            self.production = production;
            readings.push(("yearly_production".to_string(), production));
        }

        let consumption = trends.total("YEAR", "consumption");
        if self.consumption > consumption {
            warn!(new = consumption, old = self.consumption, "Skipping backwards yearly_consumption");
        } else {
            self.consumption = consumption;
            readings.push(("yearly_consumption".to_string(), consumption));
        }

        for scale in SCALES {
            readings.push((
                format!("consumption_{}", scale.to_lowercase()),
                trends.raw_total(scale, "consumption"),
            ));
        }
        readings
    }
}

pub struct EnergySource {
    http: reqwest::Client,
    config: EnergyConfig,
    username: String,
    password: String,
    session: Option<SenseSession>,
    devices: Option<BTreeSet<String>>,
    totals: YearlyTotals,
    failures: u32,
}

impl EnergySource {
    /// `None` when the source is not configured.
    pub fn new(config: &EnergyConfig) -> Result<Option<Self>, WorkerError> {
        let (Some(username), Some(password)) = (&config.username, &config.password) else {
            return Ok(None);
        };
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Some(Self {
            http,
            config: config.clone(),
            username: username.clone(),
            password: password.clone(),
            session: None,
            devices: None,
            totals: YearlyTotals::default(),
            failures: 0,
        }))
    }

    async fn collect(&mut self) -> Result<Vec<Event>, WorkerError> {
        if self.session.is_none() {
            let session = SenseSession::authenticate(
                self.http.clone(),
                &self.config.api_url,
                &self.username,
                &self.password,
            )
            .await?;
            self.session = Some(session);
        }
        let Some(session) = &self.session else {
            return Ok(Vec::new());
        };

        let realtime = session
            .realtime(&self.config.realtime_url, self.config.realtime_timeout())
            .await?;
        let trends = session.trends().await?;
        if self.devices.is_none() {
            let devices = reportable_devices(session.device_names().await?);
            info!(devices = ?devices, "Sense known devices");
            self.devices = Some(devices);
        }

        let mut readings = realtime.power_readings();
        readings.extend(self.totals.readings(&trends));
        info!(readings = ?readings, "Got sense energy values");

        let mut events: Vec<Event> = readings
            .into_iter()
            .map(|(key, value)| Event::EnergyReading {
                key: format!("{}/{}", DATA_TOPIC_PREFIX, key),
                value: Payload::Float(value),
            })
            .collect();
        if let Some(known) = &self.devices {
            events.extend(realtime.device_states(known).into_iter().map(|(name, on)| {
                Event::EnergyReading {
                    key: format!("{}/{}", DEVICE_TOPIC_PREFIX, name),
                    value: Payload::Text(if on { "on" } else { "off" }.to_string()),
                }
            }));
        }
        Ok(events)
    }
}

#[async_trait]
impl PollSource for EnergySource {
    fn client_id(&self) -> ClientId {
        ClientId::Energy
    }

    async fn fetch(&mut self, _force: bool) -> Result<Vec<Event>, WorkerError> {
        match self.collect().await {
            Ok(events) => {
                self.failures = 0;
                Ok(events)
            }
            Err(e) => {
                self.failures += 1;
                error!(failures = self.failures, error = %e, "Failed to fetch sense data");
                if self.failures > MAX_FAILURES {
                    self.session = None;
                    self.failures = 0;
                }
                Err(e)
            }
        }
    }

    fn emit_spacing(&self) -> Duration {
        self.config.emit_spacing()
    }
}
