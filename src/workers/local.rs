//! Local broker client.
//!
//! Subscribes to every local topic in the registry and forwards what it hears
//! to the dispatcher. Any disconnect purges the session so the next iteration
//! starts from a fresh client.

use std::time::Duration;

use super::broker::{BrokerProfile, BrokerWorker};
use super::mqtt::{qos_from_level, LinkOptions};
use crate::commands::{BrokerCommand, CommandSender, EventSender};
use crate::config::LocalBrokerConfig;
use crate::events::ClientId;
use crate::registry::TopicRegistry;

const TEARDOWN_TIMEOUT: Duration = Duration::from_secs(5);

pub fn local_profile(config: &LocalBrokerConfig, registry: &TopicRegistry) -> BrokerProfile {
    BrokerProfile {
        client_id: ClientId::LocalBroker,
        link: LinkOptions {
            client_id: config.client_id.clone(),
            host: config.host.clone(),
            port: config.port,
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            credentials: None,
            tls: false,
            retry: config.retry(),
        },
        topics: registry.local_topics().map(str::to_string).collect(),
        qos: qos_from_level(config.qos),
        filter_inbound: false,
        teardown_on_disconnect: true,
        connect_timeout: Some(config.connect_timeout()),
        queue_timeout: config.queue_timeout(),
        disconnected_queue_timeout: config.disconnected_queue_timeout(),
        publish_timeout: config.publish_timeout(),
        teardown_timeout: TEARDOWN_TIMEOUT,
    }
}

pub fn local_worker(
    config: &LocalBrokerConfig,
    registry: &TopicRegistry,
    signals: CommandSender<BrokerCommand>,
    events: EventSender,
) -> BrokerWorker {
    BrokerWorker::new(local_profile(config, registry), signals, events)
}
