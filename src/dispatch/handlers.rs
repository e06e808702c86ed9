//! Per-group payload transformations for local → cloud messages.
//!
//! Handlers are pure: they take the feed id and raw payload and describe
//! what should be published, if anything. A handler that cannot make sense
//! of its payload logs a warning and falls back to a neutral result.

use serde_json::Value;
use tracing::{debug, warn};

use crate::events::{translate_to_digit, BoolEncoding, Payload};
use crate::registry::Group;

const SOLAR_RATE_SCALE: f64 = 10_000.0;
const SOLAR_FEED_PREFIX: &str = "home-";
const GARAGE_DOORS: [&str; 2] = ["garage-east", "garage-west"];
const UPTIME_KEYS: [&str; 2] = ["uptime_mins", "up"];
const FREE_MEMORY_KEYS: [&str; 2] = ["mem_free", "freeKb"];

/// Payload of the command that restarts the ring-mqtt service.
pub const CMD_RESTART: &str = "restart";
/// Payload of the command that refreshes local time and weather.
pub const CMD_GET_LOCAL_TIME_AND_WEATHER: &str = "get_local_time_and_weather";

/// Side effects a local command topic can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalAction {
    RestartRing,
    FetchTimeAndWeather,
}

/// What a handler decided.
#[derive(Debug, Clone, PartialEq)]
pub enum HandlerOutput {
    Publish { feed_id: String, payload: Payload },
    Suppress,
    Action(LocalAction),
}

impl HandlerOutput {
    fn publish(feed_id: &str, payload: impl Into<Payload>) -> Self {
        HandlerOutput::Publish {
            feed_id: feed_id.to_string(),
            payload: payload.into(),
        }
    }
}

/// Run the handler registered for `group`. Groups without one pass the
/// payload through as text.
pub fn apply(group: Group, feed_id: &str, payload: &str) -> HandlerOutput {
    match group {
        Group::SolarRate => solar_rate(feed_id, payload),
        Group::LocalCommand | Group::RingCommand => local_command(payload),
        Group::HomeMotion => HandlerOutput::publish(
            feed_id,
            translate_to_digit(payload, BoolEncoding::Word),
        ),
        Group::HomeZone => home_zone(feed_id, payload),
        Group::DeviceUptime => device_json(feed_id, payload, &UPTIME_KEYS),
        Group::DeviceFreeMemory => device_json(feed_id, payload, &FREE_MEMORY_KEYS),
        _ => HandlerOutput::publish(feed_id, payload),
    }
}

/// Energy delta per second, scaled. Any failure publishes 0.
pub fn solar_rate(feed_id: &str, payload: &str) -> HandlerOutput {
    let feed_id = feed_id.strip_prefix(SOLAR_FEED_PREFIX).unwrap_or(feed_id);
    match rate(payload) {
        Some(value) => HandlerOutput::publish(feed_id, value),
        None => {
            warn!(feed_id = %feed_id, payload = %payload, "solar_rate calculation failed");
            HandlerOutput::publish(feed_id, 0i64)
        }
    }
}

fn rate(payload: &str) -> Option<f64> {
    let doc: Value = serde_json::from_str(payload).ok()?;
    let energy = doc.get("delta_decawatt_hour")?.as_f64()?;
    let seconds = doc.get("delta_seconds")?.as_f64()?;
    if seconds == 0.0 {
        return None;
    }
    let value = energy * SOLAR_RATE_SCALE / seconds;
    value.is_finite().then_some(value)
}

fn local_command(payload: &str) -> HandlerOutput {
    match payload {
        CMD_RESTART => HandlerOutput::Action(LocalAction::RestartRing),
        CMD_GET_LOCAL_TIME_AND_WEATHER => HandlerOutput::Action(LocalAction::FetchTimeAndWeather),
        other => {
            debug!(payload = %other, "Ignoring unknown local command");
            HandlerOutput::Suppress
        }
    }
}

fn home_zone(feed_id: &str, payload: &str) -> HandlerOutput {
    if !GARAGE_DOORS.contains(&feed_id) {
        return HandlerOutput::publish(feed_id, payload);
    }
    let open = matches!(payload, "open" | "opening");
    HandlerOutput::publish(feed_id, i64::from(open))
}

/// Numeric payloads pass through; JSON objects yield the first of `keys`
/// present.
pub fn device_json(feed_id: &str, payload: &str, keys: &[&str]) -> HandlerOutput {
    if payload.trim().parse::<f64>().is_ok() {
        return HandlerOutput::publish(feed_id, payload);
    }

    let doc: Value = match serde_json::from_str(payload) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(feed_id = %feed_id, payload = %payload, error = %e, keys = ?keys, "Failed to extract device value");
            return HandlerOutput::Suppress;
        }
    };
    let found = doc
        .as_object()
        .and_then(|map| keys.iter().find_map(|key| map.get(*key)))
        .and_then(Payload::from_json);
    match found {
        Some(value) => HandlerOutput::Publish {
            feed_id: feed_id.to_string(),
            payload: value,
        },
        None => {
            warn!(feed_id = %feed_id, payload = %payload, keys = ?keys, "Failed to find device value");
            HandlerOutput::Suppress
        }
    }
}
