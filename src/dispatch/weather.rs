//! Weather payload reshaping.

use chrono::{Local, TimeZone};
use serde_json::Value;
use tracing::warn;

use crate::events::Payload;
use crate::registry::TOPIC_OPENWEATHER_PREFIX;

/// Local topics and payloads derived from an OpenWeatherMap document:
/// `raw` (the whole document), `sunrise`/`sunset` as `H:MM` local time when
/// present, then every entry of `main`.
pub fn weather_topics(payload: &Value) -> Vec<(String, Payload)> {
    let topic = |name: &str| format!("{}/{}", TOPIC_OPENWEATHER_PREFIX, name);
    let mut topics = vec![(topic("raw"), Payload::Text(payload.to_string()))];

    for key in ["sunrise", "sunset"] {
        let clock = payload
            .pointer(&format!("/sys/{}", key))
            .and_then(Value::as_i64)
            .filter(|ts| *ts != 0)
            .and_then(local_clock);
        if let Some(clock) = clock {
            topics.push((topic(key), Payload::Text(clock)));
        }
    }

    if let Some(main) = payload.get("main").and_then(Value::as_object) {
        for (key, value) in main {
            if let Some(value) = Payload::from_json(value) {
                topics.push((topic(key), value));
            }
        }
    }
    topics
}

/// Unix timestamp as `H:MM` in local time.
pub fn local_clock(ts: i64) -> Option<String> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|at| at.format("%-H:%M").to_string())
}

/// Add `precipProbabilityPercent` (URL-encoded percent text) to a forecast
/// document. Anything that is not a JSON object is returned unchanged.
pub fn annotate_forecast(payload: &str) -> String {
    let mut doc: Value = match serde_json::from_str(payload) {
        Ok(doc) => doc,
        Err(e) => {
            warn!(error = %e, "Unable to parse forecast payload");
            return payload.to_string();
        }
    };
    let Some(map) = doc.as_object_mut() else {
        warn!("Forecast payload is not an object");
        return payload.to_string();
    };
    let probability = map
        .get("precipProbability")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let percent = (probability * 100.0) as i64;
    map.insert(
        "precipProbabilityPercent".to_string(),
        Value::String(format!("{}+%25", percent)),
    );
    doc.to_string()
}
