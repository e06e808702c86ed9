//! Plain MQTT broker worker.
//!
//! Shared by the local broker client and the Adafruit IO throttle notifier:
//! both subscribe to a fixed topic list on every (re)connect, forward inbound
//! messages as events and publish on request. They differ only in the
//! [`BrokerProfile`] they are built with.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::mqtt::{LinkOptions, MqttLink};
use super::{ClientWorker, WorkerError};
use crate::commands::{BrokerCommand, CommandSender, EventSender, LinkSignal};
use crate::events::{ClientId, ConnectionStatus, Event};

/// Per-connection knobs of a [`BrokerWorker`].
#[derive(Debug, Clone)]
pub struct BrokerProfile {
    pub client_id: ClientId,
    pub link: LinkOptions,
    /// Topics subscribed after every successful connect.
    pub topics: Vec<String>,
    pub qos: QoS,
    /// Drop inbound messages whose topic is not in `topics`.
    pub filter_inbound: bool,
    /// Tear the session down as soon as it reports a disconnect.
    pub teardown_on_disconnect: bool,
    /// Rebuild the session when it has not connected within this long.
    pub connect_timeout: Option<Duration>,
    pub queue_timeout: Duration,
    /// Queue read timeout while not connected, so `maintain` runs often.
    pub disconnected_queue_timeout: Duration,
    pub publish_timeout: Duration,
    pub teardown_timeout: Duration,
}

pub struct BrokerWorker {
    profile: BrokerProfile,
    accepted: HashSet<String>,
    link: Option<MqttLink>,
    connected: bool,
    link_started: Instant,
    signals: CommandSender<BrokerCommand>,
    events: EventSender,
}

impl BrokerWorker {
    /// `signals` must feed the same queue this worker is run with.
    pub fn new(
        profile: BrokerProfile,
        signals: CommandSender<BrokerCommand>,
        events: EventSender,
    ) -> Self {
        let accepted = profile.topics.iter().cloned().collect();
        Self {
            profile,
            accepted,
            link: None,
            connected: false,
            link_started: Instant::now(),
            signals,
            events,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn topics(&self) -> &[String] {
        &self.profile.topics
    }

    async fn purge(&mut self, why: &str) {
        if let Some(link) = self.link.take() {
            warn!(client_id = %self.profile.client_id, reason = why, "Purging MQTT client");
            link.teardown(&[], self.profile.teardown_timeout).await;
        }
        self.connected = false;
    }

    fn accepts(&self, topic: &str) -> bool {
        !self.profile.filter_inbound || self.accepted.contains(topic)
    }

    async fn on_link(&mut self, signal: LinkSignal) -> Result<(), WorkerError> {
        let client_id = self.profile.client_id;
        match signal {
            LinkSignal::Inbound { topic, payload } => {
                if !self.accepts(&topic) {
                    debug!(client_id = %client_id, topic = %topic, "Ignoring message on unexpected topic");
                    return Ok(());
                }
                self.events.put(Event::message(client_id, topic, payload))?;
            }
            LinkSignal::Connection { status, reason } => {
                match status {
                    ConnectionStatus::Connected => {
                        self.connected = true;
                        info!(client_id = %client_id, "Connected");
                        if let Some(link) = &self.link {
                            link.subscribe_many(&self.profile.topics, self.profile.qos)
                                .await?;
                            debug!(
                                client_id = %client_id,
                                topics = self.profile.topics.len(),
                                "Subscribed"
                            );
                        }
                    }
                    ConnectionStatus::Disconnected => {
                        self.connected = false;
                        self.link_started = Instant::now();
                        warn!(client_id = %client_id, reason = ?reason, "Disconnected");
                        if self.profile.teardown_on_disconnect {
                            self.purge("disconnected").await;
                        }
                    }
                }
                self.events.put(Event::connect(client_id, status, reason))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ClientWorker for BrokerWorker {
    type Command = BrokerCommand;

    fn client_id(&self) -> ClientId {
        self.profile.client_id
    }

    async fn maintain(&mut self) -> Result<(), WorkerError> {
        if self.link.is_none() {
            self.link = Some(MqttLink::start(&self.profile.link, self.signals.clone()));
            self.link_started = Instant::now();
            self.connected = false;
            return Ok(());
        }
        if let Some(limit) = self.profile.connect_timeout {
            if !self.connected && self.link_started.elapsed() >= limit {
                self.purge("connect timeout").await;
            }
        }
        Ok(())
    }

    fn queue_timeout(&self) -> Duration {
        if self.connected {
            self.profile.queue_timeout
        } else {
            self.profile.disconnected_queue_timeout
        }
    }

    async fn execute(&mut self, command: BrokerCommand) -> Result<(), WorkerError> {
        match command {
            BrokerCommand::Publish {
                topic,
                payload,
                retain,
            } => {
                let Some(link) = self.link.as_ref().filter(|_| self.connected) else {
                    warn!(
                        client_id = %self.profile.client_id,
                        topic = %topic,
                        "Not connected: dropping publish"
                    );
                    return Ok(());
                };
                debug!(client_id = %self.profile.client_id, topic = %topic, payload = %payload, "Publishing");
                link.publish(
                    &topic,
                    payload.to_text(),
                    self.profile.qos,
                    retain,
                    self.profile.publish_timeout,
                )
                .await
            }
            BrokerCommand::Link(signal) => self.on_link(signal).await,
        }
    }

    async fn shutdown(&mut self) {
        if let Some(link) = self.link.take() {
            link.teardown(&self.profile.topics, self.profile.teardown_timeout)
                .await;
        }
        self.connected = false;
    }
}
