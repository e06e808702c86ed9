//! Event model.
//!
//! Events flow from client workers (and the scheduler) to the dispatcher over
//! the shared event queue. Every event is consumed exactly once and is never
//! persisted.

mod payload;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use payload::{translate_text, translate_to_digit, BoolEncoding, BoolLike, Payload};

use crate::scheduler::Job;

/// Identity of an event producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClientId {
    /// Local MQTT broker client.
    LocalBroker,
    /// Adafruit IO MQTT client (feeds, groups, integrations).
    Cloud,
    /// Adafruit IO MQTT client listening on the errors/throttle topics.
    CloudThrottle,
    /// OpenWeatherMap polling source.
    Weather,
    /// Sense energy monitor polling source.
    Energy,
    /// Parking-bay status file polling source.
    ParkingBays,
}

impl ClientId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClientId::LocalBroker => "adaio_local",
            ClientId::Cloud => "Adafruit_IO",
            ClientId::CloudThrottle => "Adafruit_IO_Throttle",
            ClientId::Weather => "openweather",
            ClientId::Energy => "sense_energy",
            ClientId::ParkingBays => "ev_bays",
        }
    }

    /// Whether this worker holds an MQTT session.
    pub fn is_mqtt(&self) -> bool {
        matches!(
            self,
            ClientId::LocalBroker | ClientId::Cloud | ClientId::CloudThrottle
        )
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection state reported by an MQTT-backed worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse routing key used by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventGroup {
    Mqtt,
    LocalTime,
    OpenWeather,
    SenseEnergy,
    EvBays,
    Scheduler,
}

impl EventGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventGroup::Mqtt => "mqtt",
            EventGroup::LocalTime => "local_time",
            EventGroup::OpenWeather => "open_weather",
            EventGroup::SenseEnergy => "sense_energy",
            EventGroup::EvBays => "ev_bays",
            EventGroup::Scheduler => "scheduler",
        }
    }
}

impl fmt::Display for EventGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Something that happened, as seen by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    /// Message received on an MQTT connection (or fetched over REST).
    ///
    /// For the cloud client `topic` carries the feed id.
    MqttMessage {
        client_id: ClientId,
        topic: String,
        payload: String,
    },
    /// Connection state transition of an MQTT connection.
    MqttConnect {
        client_id: ClientId,
        status: ConnectionStatus,
        reason: Option<String>,
    },
    /// Local time text as reported by the cloud time service.
    LocalTime { text: String },
    /// Current weather document.
    Weather { payload: serde_json::Value },
    /// One energy monitor reading, keyed by the local topic it belongs on.
    EnergyReading { key: String, value: Payload },
    /// Raw parking-bay status document.
    ParkingBaysUpdate { payload: String },
    /// A scheduled job came due.
    Scheduled { job: Job },
}

impl Event {
    pub fn message(client_id: ClientId, topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Event::MqttMessage {
            client_id,
            topic: topic.into(),
            payload: payload.into(),
        }
    }

    pub fn connect(client_id: ClientId, status: ConnectionStatus, reason: Option<String>) -> Self {
        Event::MqttConnect {
            client_id,
            status,
            reason,
        }
    }

    /// Variant tag.
    pub fn name(&self) -> &'static str {
        match self {
            Event::MqttMessage { .. } => "MqttMessage",
            Event::MqttConnect { .. } => "MqttConnect",
            Event::LocalTime { .. } => "LocalTime",
            Event::Weather { .. } => "Weather",
            Event::EnergyReading { .. } => "EnergyReading",
            Event::ParkingBaysUpdate { .. } => "ParkingBaysUpdate",
            Event::Scheduled { .. } => "Scheduled",
        }
    }

    pub fn group(&self) -> EventGroup {
        match self {
            Event::MqttMessage { .. } | Event::MqttConnect { .. } => EventGroup::Mqtt,
            Event::LocalTime { .. } => EventGroup::LocalTime,
            Event::Weather { .. } => EventGroup::OpenWeather,
            Event::EnergyReading { .. } => EventGroup::SenseEnergy,
            Event::ParkingBaysUpdate { .. } => EventGroup::EvBays,
            Event::Scheduled { .. } => EventGroup::Scheduler,
        }
    }

    /// Human readable description, for logs.
    pub fn description(&self) -> &'static str {
        match self {
            Event::MqttMessage { .. } => "mqtt msg",
            Event::MqttConnect { .. } => "mqtt conn",
            Event::LocalTime { .. } => "aio local time",
            Event::Weather { .. } => "weather",
            Event::EnergyReading { .. } => "sense data",
            Event::ParkingBaysUpdate { .. } => "ev bays update",
            Event::Scheduled { .. } => "scheduled job",
        }
    }

    /// Originating client, for events produced by MQTT workers.
    pub fn client_id(&self) -> Option<ClientId> {
        match self {
            Event::MqttMessage { client_id, .. } | Event::MqttConnect { client_id, .. } => {
                Some(*client_id)
            }
            _ => None,
        }
    }
}
