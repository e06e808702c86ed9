//! Adafruit IO client.
//!
//! Owns the MQTT session to Adafruit IO plus the REST client used for
//! explicit fetches. Inbound messages are reported with the feed id (not the
//! raw topic) in the event's `topic` field.
//!
//! Adafruit IO silently drops subscriptions now and then, so the worker
//! renews all of them whenever nothing has arrived for a while.

mod rest;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::QoS;
use tokio::time::Instant;
use tracing::{debug, info, warn};

pub use rest::AdafruitRest;

use super::mqtt::{LinkOptions, MqttLink};
use super::{ClientWorker, WorkerError};
use crate::commands::{CloudCommand, CommandSender, EventSender, LinkSignal};
use crate::config::CloudConfig;
use crate::events::{ClientId, ConnectionStatus, Event, Payload};
use crate::registry::TopicRegistry;

const SUBSCRIBE_QOS: QoS = QoS::AtLeastOnce;
const PUBLISH_QOS: QoS = QoS::AtMostOnce;

/// Feed id carried by an Adafruit IO topic.
///
/// - `{user}/feeds/{feed}` yields the feed key
/// - `{user}/groups/{group}/...` yields the segment after the group
/// - `{user}/integration/weather/{id}/{forecast}` yields the forecast name
/// - `{user}/integration/words/{id}` yields `words`
/// - `time/...` yields `time`
pub fn feed_id_from_topic(topic: &str) -> Option<String> {
    let parts: Vec<&str> = topic.split('/').collect();
    if parts.first() == Some(&"time") {
        return Some("time".to_string());
    }
    let picked = match (parts.get(1), parts.get(2)) {
        (Some(&"groups"), _) => parts.get(3),
        (_, Some(&"weather")) => parts.get(4),
        _ => parts.get(2),
    };
    picked
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.to_string())
}

/// Topic to publish `feed_id` (optionally within `group`) on.
pub fn publish_topic(username: &str, feed_id: &str, group: Option<&str>) -> String {
    match group {
        Some(group) => format!("{}/feeds/{}.{}", username, group, feed_id),
        None => format!("{}/feeds/{}", username, feed_id),
    }
}

/// Every topic the cloud session listens on, in subscription order: feeds,
/// then weather forecasts, then the randomizer.
pub fn subscription_topics(config: &CloudConfig, registry: &TopicRegistry) -> Vec<String> {
    let user = &config.username;
    let mut topics: Vec<String> = registry
        .remote_feed_ids()
        .map(|feed_id| format!("{}/feeds/{}", user, feed_id))
        .collect();
    if let Some(weather_id) = &config.weather_id {
        topics.extend(
            config
                .forecasts
                .iter()
                .map(|forecast| format!("{}/integration/weather/{}/{}", user, weather_id, forecast)),
        );
    }
    if let Some(randomizer_id) = &config.randomizer_id {
        topics.push(format!("{}/integration/words/{}", user, randomizer_id));
    }
    topics
}

pub struct CloudWorker {
    config: CloudConfig,
    link_options: LinkOptions,
    topics: Vec<String>,
    rest: AdafruitRest,
    known_feeds: HashSet<String>,
    link: Option<MqttLink>,
    connected: bool,
    link_started: Instant,
    /// Last subscription or inbound message. `None` forces a resubscribe.
    last_message: Option<Instant>,
    signals: CommandSender<CloudCommand>,
    events: EventSender,
}

impl CloudWorker {
    pub fn new(
        config: &CloudConfig,
        registry: &TopicRegistry,
        signals: CommandSender<CloudCommand>,
        events: EventSender,
    ) -> Result<Self, WorkerError> {
        let link_options = LinkOptions {
            client_id: config.client_id.clone(),
            host: config.host.clone(),
            port: config.port,
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            credentials: Some((config.username.clone(), config.key.clone())),
            tls: true,
            retry: config.retry(),
        };
        Ok(Self {
            config: config.clone(),
            link_options,
            topics: subscription_topics(config, registry),
            rest: AdafruitRest::new(config)?,
            known_feeds: HashSet::new(),
            link: None,
            connected: false,
            link_started: Instant::now(),
            last_message: None,
            signals,
            events,
        })
    }

    pub fn topics(&self) -> &[String] {
        &self.topics
    }

    fn needs_resubscribe(&self) -> bool {
        match self.last_message {
            None => true,
            Some(at) => at.elapsed() >= self.config.resubscribe_interval(),
        }
    }

    async fn check_subscription(&mut self) -> Result<(), WorkerError> {
        if !self.connected || !self.needs_resubscribe() {
            return Ok(());
        }
        let Some(link) = &self.link else {
            return Ok(());
        };
        info!(client_id = %ClientId::Cloud, topics = self.topics.len(), "Subscribing");
        for (i, topic) in self.topics.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(self.config.subscribe_spacing()).await;
            }
            link.subscribe(topic, SUBSCRIBE_QOS).await?;
            debug!(topic = %topic, "Subscribed");
        }
        self.last_message = Some(Instant::now());
        Ok(())
    }

    async fn purge(&mut self, why: &str) {
        if let Some(link) = self.link.take() {
            warn!(client_id = %ClientId::Cloud, reason = why, "Purging MQTT client");
            link.teardown(&self.topics, self.config.teardown_timeout()).await;
        }
        self.connected = false;
    }

    async fn publish(
        &mut self,
        feed_id: &str,
        payload: Payload,
        group: Option<&str>,
    ) -> Result<(), WorkerError> {
        let Some(link) = self.link.as_ref().filter(|_| self.connected) else {
            warn!(client_id = %ClientId::Cloud, feed_id = %feed_id, "Not connected: dropping publish");
            return Ok(());
        };
        let topic = publish_topic(&self.config.username, feed_id, group);
        debug!(topic = %topic, payload = %payload, "Publishing");
        link.publish(
            &topic,
            payload.to_text(),
            PUBLISH_QOS,
            false,
            self.config.publish_timeout(),
        )
        .await
    }

    async fn fetch_feed(&mut self, feed_id: &str) -> Result<(), WorkerError> {
        let timeout = self.config.fetch_timeout();
        if !self.known_feeds.contains(feed_id) {
            match tokio::time::timeout(timeout, self.rest.feed_exists(feed_id)).await {
                Ok(Ok(())) => {
                    self.known_feeds.insert(feed_id.to_string());
                }
                Ok(Err(e)) => {
                    warn!(feed_id = %feed_id, error = %e, "Requested unknown feed_id");
                    return Ok(());
                }
                Err(_) => return Err(WorkerError::Timeout(timeout)),
            }
        }
        let value = tokio::time::timeout(timeout, self.rest.last_value(feed_id))
            .await
            .map_err(|_| WorkerError::Timeout(timeout))??;
        self.events
            .put(Event::message(ClientId::Cloud, feed_id, value))?;
        Ok(())
    }

    async fn fetch_local_time(&mut self) -> Result<(), WorkerError> {
        let timeout = self.config.fetch_timeout();
        let text = tokio::time::timeout(timeout, self.rest.local_time())
            .await
            .map_err(|_| WorkerError::Timeout(timeout))??;
        self.events.put(Event::LocalTime { text })?;
        Ok(())
    }

    async fn on_link(&mut self, signal: LinkSignal) -> Result<(), WorkerError> {
        match signal {
            LinkSignal::Inbound { topic, payload } => {
                self.last_message = Some(Instant::now());
                let Some(feed_id) = feed_id_from_topic(&topic) else {
                    debug!(topic = %topic, "Ignoring message on unparseable topic");
                    return Ok(());
                };
                self.events
                    .put(Event::message(ClientId::Cloud, feed_id, payload))?;
            }
            LinkSignal::Connection { status, reason } => {
                self.connected = status.is_connected();
                self.last_message = None;
                match status {
                    ConnectionStatus::Connected => info!(client_id = %ClientId::Cloud, "Connected"),
                    ConnectionStatus::Disconnected => {
                        warn!(client_id = %ClientId::Cloud, reason = ?reason, "Disconnected");
                        self.link_started = Instant::now();
                    }
                }
                self.events
                    .put(Event::connect(ClientId::Cloud, status, reason))?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ClientWorker for CloudWorker {
    type Command = CloudCommand;

    fn client_id(&self) -> ClientId {
        ClientId::Cloud
    }

    async fn maintain(&mut self) -> Result<(), WorkerError> {
        if self.link.is_none() {
            self.link = Some(MqttLink::start(&self.link_options, self.signals.clone()));
            self.link_started = Instant::now();
            self.connected = false;
            self.last_message = None;
            return Ok(());
        }
        if !self.connected && self.link_started.elapsed() >= self.config.connect_timeout() {
            self.purge("connect timeout").await;
            return Ok(());
        }
        self.check_subscription().await
    }

    fn queue_timeout(&self) -> Duration {
        self.config.queue_timeout(self.connected)
    }

    async fn execute(&mut self, command: CloudCommand) -> Result<(), WorkerError> {
        match command {
            CloudCommand::Publish {
                feed_id,
                payload,
                group,
            } => self.publish(&feed_id, payload, group.as_deref()).await,
            CloudCommand::FetchFeed { feed_id } => self.fetch_feed(&feed_id).await,
            CloudCommand::FetchLocalTime => self.fetch_local_time().await,
            CloudCommand::Link(signal) => self.on_link(signal).await,
        }
    }

    async fn on_idle(&mut self) -> Result<(), WorkerError> {
        self.check_subscription().await
    }

    async fn shutdown(&mut self) {
        if let Some(link) = self.link.take() {
            link.teardown(&self.topics, self.config.teardown_timeout())
                .await;
        }
        self.connected = false;
    }
}
