//! MQTT connection driver.
//!
//! `rumqttc` splits a session into an [`AsyncClient`] (requests) and an
//! [`EventLoop`] (I/O). The event loop runs in its own task and translates
//! what it sees into [`LinkSignal`]s pushed onto the owning worker's command
//! queue, so connection callbacks and inbound messages are handled in the
//! worker's context like any other command.

use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, Incoming, MqttOptions, QoS,
    SubscribeFilter, Transport,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::WorkerError;
use crate::commands::{CommandSender, LinkSignal};
use crate::events::ConnectionStatus;
use crate::utils::retry::RetryConfig;

/// Capacity of the client-to-event-loop request channel.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Everything needed to open one MQTT session.
#[derive(Debug, Clone)]
pub struct LinkOptions {
    pub client_id: String,
    pub host: String,
    pub port: u16,
    pub keep_alive: Duration,
    /// Username and password.
    pub credentials: Option<(String, String)>,
    pub tls: bool,
    pub retry: RetryConfig,
}

impl LinkOptions {
    fn mqtt_options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(&self.client_id, &self.host, self.port);
        options.set_keep_alive(self.keep_alive);
        options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username, password);
        }
        if self.tls {
            options.set_transport(Transport::tls_with_default_config());
        }
        options
    }
}

/// Map a numeric QoS (0..=2) onto rumqttc's enum. Values above 2 saturate.
pub fn qos_from_level(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

/// One live MQTT session: the request handle plus its I/O task.
pub struct MqttLink {
    client: AsyncClient,
    driver: JoinHandle<()>,
}

impl MqttLink {
    /// Open a session. Connection changes and inbound messages are delivered
    /// to `signals`.
    pub fn start<C>(options: &LinkOptions, signals: CommandSender<C>) -> Self
    where
        C: From<LinkSignal> + Send + 'static,
    {
        info!(
            client_id = %options.client_id,
            host = %options.host,
            port = options.port,
            "Creating MQTT client"
        );
        let (client, eventloop) = AsyncClient::new(options.mqtt_options(), REQUEST_CHANNEL_CAPACITY);
        let driver = tokio::spawn(drive(eventloop, signals, options.retry.clone()));
        Self { client, driver }
    }

    pub async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), WorkerError> {
        self.client.subscribe(topic, qos).await?;
        Ok(())
    }

    pub async fn subscribe_many(&self, topics: &[String], qos: QoS) -> Result<(), WorkerError> {
        if topics.is_empty() {
            return Ok(());
        }
        let filters = topics
            .iter()
            .map(|topic| SubscribeFilter::new(topic.clone(), qos));
        self.client.subscribe_many(filters).await?;
        Ok(())
    }

    /// Publish, bounded by `timeout`.
    pub async fn publish(
        &self,
        topic: &str,
        payload: String,
        qos: QoS,
        retain: bool,
        timeout: Duration,
    ) -> Result<(), WorkerError> {
        match tokio::time::timeout(timeout, self.client.publish(topic, qos, retain, payload)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(WorkerError::Timeout(timeout)),
        }
    }

    /// Unsubscribe `topics`, disconnect and stop the I/O task. Never waits
    /// longer than `timeout` and never fails.
    pub async fn teardown(self, topics: &[String], timeout: Duration) {
        let client = self.client.clone();
        let topics = topics.to_vec();
        let polite = async move {
            for topic in &topics {
                if client.unsubscribe(topic.as_str()).await.is_err() {
                    break;
                }
            }
            let _ = client.disconnect().await;
        };
        if tokio::time::timeout(timeout, polite).await.is_err() {
            warn!(timeout = ?timeout, "MQTT teardown timed out");
        }
        // Give the event loop a moment to flush the disconnect.
        tokio::time::sleep(Duration::from_millis(100)).await;
        self.driver.abort();
    }
}

impl Drop for MqttLink {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

async fn drive<C>(mut eventloop: EventLoop, signals: CommandSender<C>, retry: RetryConfig)
where
    C: From<LinkSignal> + Send + 'static,
{
    let mut connected = false;
    let mut attempt: u32 = 0;

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(ack))) => {
                attempt = 0;
                if ack.code == ConnectReturnCode::Success {
                    connected = true;
                    signals.enqueue(C::from(LinkSignal::Connection {
                        status: ConnectionStatus::Connected,
                        reason: None,
                    }));
                } else {
                    warn!(client_id = %signals.client_id(), code = ?ack.code, "Connection rejected");
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                let payload = String::from_utf8_lossy(&publish.payload).into_owned();
                signals.enqueue(C::from(LinkSignal::Inbound {
                    topic: publish.topic,
                    payload,
                }));
            }
            Ok(Event::Incoming(Incoming::Disconnect)) => {
                debug!(client_id = %signals.client_id(), "Broker sent disconnect");
            }
            Ok(_) => {}
            Err(e) => {
                if connected {
                    connected = false;
                    signals.enqueue(C::from(LinkSignal::Connection {
                        status: ConnectionStatus::Disconnected,
                        reason: Some(describe(&e)),
                    }));
                }
                let delay = retry.delay_for_attempt(attempt);
                attempt = attempt.saturating_add(1);
                warn!(
                    client_id = %signals.client_id(),
                    error = %e,
                    retry_in = ?delay,
                    "MQTT connection error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}

fn describe(e: &ConnectionError) -> String {
    match e {
        ConnectionError::ConnectionRefused(code) => format!("refused: {:?}", code),
        other => other.to_string(),
    }
}
