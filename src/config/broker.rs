//! MQTT connection configuration.

use std::time::Duration;

use serde::Deserialize;

use crate::utils::retry::RetryConfig;

// ============================================================================
// Local broker
// ============================================================================

/// Local MQTT broker connection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalBrokerConfig {
    /// Broker host name or address.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// MQTT client id.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// QoS for subscriptions.
    pub qos: u8,
    /// Command queue capacity.
    pub queue_size: usize,
    /// Command queue read timeout while connected, in seconds.
    pub queue_timeout_secs: u64,
    /// Command queue read timeout while disconnected, in seconds.
    pub disconnected_queue_timeout_secs: u64,
    /// Hard timeout for a single publish.
    pub publish_timeout_secs: f64,
    /// Seconds without a successful connection before the client is rebuilt.
    pub connect_timeout_secs: u64,
    /// Initial reconnect backoff in seconds.
    pub reconnect_min_secs: u64,
    /// Reconnect backoff cap in seconds.
    pub reconnect_max_secs: u64,
}

impl Default for LocalBrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "adaio_local".to_string(),
            keep_alive_secs: 179,
            qos: 1,
            queue_size: 100,
            queue_timeout_secs: 66,
            disconnected_queue_timeout_secs: 1,
            publish_timeout_secs: 9.9,
            connect_timeout_secs: 180,
            reconnect_min_secs: 1,
            reconnect_max_secs: 30,
        }
    }
}

impl LocalBrokerConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn disconnected_queue_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnected_queue_timeout_secs)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.publish_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::for_reconnect(
            Duration::from_secs(self.reconnect_min_secs),
            Duration::from_secs(self.reconnect_max_secs),
        )
    }
}

// ============================================================================
// Adafruit IO
// ============================================================================

/// Adafruit IO connection, shared by the cloud and throttle workers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    /// Adafruit IO user name.
    pub username: String,
    /// Adafruit IO key.
    pub key: String,
    /// MQTT host.
    pub host: String,
    /// MQTT TLS port.
    pub port: u16,
    /// MQTT client id.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// REST API base URL.
    pub rest_url: String,
    /// Weather integration record id. None disables the weather subscription.
    pub weather_id: Option<String>,
    /// Forecast names subscribed for the weather integration.
    pub forecasts: Vec<String>,
    /// Words integration id. None disables the randomizer subscription.
    pub randomizer_id: Option<String>,
    /// Command queue capacity.
    pub queue_size: usize,
    /// Command queue read timeout while connected, in seconds.
    pub queue_timeout_secs: u64,
    /// Command queue read timeout while disconnected, in seconds.
    pub disconnected_queue_timeout_secs: u64,
    /// Seconds without a connection before the client is rebuilt.
    pub connect_timeout_secs: u64,
    /// Seconds of inbound silence before subscriptions are renewed.
    pub resubscribe_secs: u64,
    /// Pause between consecutive subscribe requests, in milliseconds.
    pub subscribe_spacing_ms: u64,
    /// Hard timeout for a single publish.
    pub publish_timeout_secs: f64,
    /// Hard timeout for a single REST fetch.
    pub fetch_timeout_secs: f64,
    /// Hard timeout for tearing the client down.
    pub teardown_timeout_secs: f64,
    /// Initial reconnect backoff in seconds.
    pub reconnect_min_secs: u64,
    /// Reconnect backoff cap in seconds.
    pub reconnect_max_secs: u64,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            key: String::new(),
            host: "io.adafruit.com".to_string(),
            port: 8883,
            client_id: "Adafruit_IO".to_string(),
            keep_alive_secs: 60,
            rest_url: "https://io.adafruit.com/api/v2".to_string(),
            weather_id: None,
            forecasts: vec!["current".to_string()],
            randomizer_id: None,
            queue_size: 900,
            queue_timeout_secs: 300,
            disconnected_queue_timeout_secs: 1,
            connect_timeout_secs: 180,
            resubscribe_secs: 1201,
            subscribe_spacing_ms: 500,
            publish_timeout_secs: 9.9,
            fetch_timeout_secs: 16.16,
            teardown_timeout_secs: 13.9,
            reconnect_min_secs: 2,
            reconnect_max_secs: 60,
        }
    }
}

impl CloudConfig {
    pub fn queue_timeout(&self, connected: bool) -> Duration {
        if connected {
            Duration::from_secs(self.queue_timeout_secs)
        } else {
            Duration::from_secs(self.disconnected_queue_timeout_secs)
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn resubscribe_interval(&self) -> Duration {
        Duration::from_secs(self.resubscribe_secs)
    }

    pub fn subscribe_spacing(&self) -> Duration {
        Duration::from_millis(self.subscribe_spacing_ms)
    }

    pub fn publish_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.publish_timeout_secs)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.fetch_timeout_secs)
    }

    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.teardown_timeout_secs)
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig::for_reconnect(
            Duration::from_secs(self.reconnect_min_secs),
            Duration::from_secs(self.reconnect_max_secs),
        )
    }
}

// ============================================================================
// Throttle notifier
// ============================================================================

/// Adafruit IO throttle/error notifier. Host and credentials come from
/// [`CloudConfig`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// MQTT client id.
    pub client_id: String,
    /// Keep-alive interval in seconds.
    pub keep_alive_secs: u64,
    /// Command queue capacity.
    pub queue_size: usize,
    /// Command queue read timeout while connected, in seconds.
    pub queue_timeout_secs: u64,
    /// Command queue read timeout while disconnected, in seconds.
    pub disconnected_queue_timeout_secs: u64,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            client_id: "Adafruit_IO_Throttle".to_string(),
            keep_alive_secs: 169,
            queue_size: 100,
            queue_timeout_secs: 366,
            disconnected_queue_timeout_secs: 1,
        }
    }
}

impl ThrottleConfig {
    pub fn queue_timeout(&self) -> Duration {
        Duration::from_secs(self.queue_timeout_secs)
    }

    pub fn disconnected_queue_timeout(&self) -> Duration {
        Duration::from_secs(self.disconnected_queue_timeout_secs)
    }

    /// Topics carrying throttle and error notices for `username`.
    pub fn topics(&self, username: &str) -> Vec<String> {
        vec![format!("{}/errors", username), format!("{}/throttle", username)]
    }
}
