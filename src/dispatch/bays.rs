//! Parking-bay change tracking.
//!
//! The status document lists stations under `aaData.stations`, each with a
//! `name` and a `status`. Only stations whose status differs from the cached
//! one are reported as changed.

use std::collections::BTreeMap;

use chrono::{DateTime, Local};
use serde_json::Value;

/// Status code of a bay status text.
pub fn status_code(status: &str) -> u8 {
    match status {
        "Available" => 0,
        "In use" => 1,
        "Offline" => 2,
        _ => 3,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Bay {
    pub status: String,
    pub last_change: DateTime<Local>,
}

/// A bay whose status changed on this update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedBay {
    /// Station name with spaces replaced by `-`.
    pub name: String,
    pub status: String,
    pub code: u8,
    /// `hh:mm am` of the change for usable bays, the raw status otherwise.
    pub simple_time: String,
}

impl ChangedBay {
    /// Feed id prefix for this bay: lower case, `westford-` becomes `bay`.
    pub fn feed_name(&self) -> String {
        self.name.to_lowercase().replace("westford-", "bay")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaysUpdate {
    pub changed: Vec<ChangedBay>,
    /// Status codes of every known bay, ordered by name.
    pub bays: String,
    /// Number of known bays currently available.
    pub available: usize,
}

#[derive(Debug, Default)]
pub struct BayState {
    cache: BTreeMap<String, Bay>,
}

impl BayState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process(&mut self, doc: &Value, now: DateTime<Local>) -> BaysUpdate {
        let stations = doc
            .pointer("/aaData/stations")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        let mut changed = Vec::new();
        for station in stations {
            let name = station.get("name").and_then(Value::as_str).unwrap_or_default();
            let status = station.get("status").and_then(Value::as_str).unwrap_or_default();
            if name.is_empty() || status.is_empty() {
                continue;
            }
            let name = name.replace(' ', "-");
            if self.cache.get(&name).is_some_and(|bay| bay.status == status) {
                continue;
            }

            let code = status_code(status);
            let simple_time = if code <= 1 {
                now.format("%I:%M %p").to_string().to_lowercase()
            } else {
                status.to_string()
            };
            self.cache.insert(
                name.clone(),
                Bay {
                    status: status.to_string(),
                    last_change: now,
                },
            );
            changed.push(ChangedBay {
                name,
                status: status.to_string(),
                code,
                simple_time,
            });
        }

        BaysUpdate {
            changed,
            bays: self
                .cache
                .values()
                .map(|bay| status_code(&bay.status).to_string())
                .collect(),
            available: self
                .cache
                .values()
                .filter(|bay| status_code(&bay.status) == 0)
                .count(),
        }
    }

    /// Forget every bay so the next update reports all of them.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }
}
