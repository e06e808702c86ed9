//! Adafruit IO throttle notifier.
//!
//! A second, independent session to Adafruit IO that only listens on the
//! account's `errors` and `throttle` topics. It never publishes.

use std::time::Duration;

use rumqttc::QoS;

use super::broker::{BrokerProfile, BrokerWorker};
use super::mqtt::LinkOptions;
use crate::commands::{BrokerCommand, CommandSender, EventSender};
use crate::config::{CloudConfig, ThrottleConfig};
use crate::events::ClientId;

pub fn throttle_profile(config: &ThrottleConfig, cloud: &CloudConfig) -> BrokerProfile {
    BrokerProfile {
        client_id: ClientId::CloudThrottle,
        link: LinkOptions {
            client_id: config.client_id.clone(),
            host: cloud.host.clone(),
            port: cloud.port,
            keep_alive: Duration::from_secs(config.keep_alive_secs),
            credentials: Some((cloud.username.clone(), cloud.key.clone())),
            tls: true,
            retry: cloud.retry(),
        },
        topics: config.topics(&cloud.username),
        qos: QoS::AtLeastOnce,
        filter_inbound: true,
        teardown_on_disconnect: false,
        connect_timeout: Some(cloud.connect_timeout()),
        queue_timeout: config.queue_timeout(),
        disconnected_queue_timeout: config.disconnected_queue_timeout(),
        publish_timeout: cloud.publish_timeout(),
        teardown_timeout: cloud.teardown_timeout(),
    }
}

pub fn throttle_worker(
    config: &ThrottleConfig,
    cloud: &CloudConfig,
    signals: CommandSender<BrokerCommand>,
    events: EventSender,
) -> BrokerWorker {
    BrokerWorker::new(throttle_profile(config, cloud), signals, events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{command_queue, event_queue};
    use crate::config::Config;
    use crate::workers::ClientWorker;

    #[test]
    fn test_throttle_profile() {
        let config = Config::for_test();
        let profile = throttle_profile(&config.throttle, &config.cloud);

        assert_eq!(profile.client_id, ClientId::CloudThrottle);
        assert_eq!(profile.topics, vec!["tester/errors", "tester/throttle"]);
        assert!(profile.filter_inbound);
        assert!(profile.link.tls);
        assert_eq!(profile.link.port, 8883);
        assert_eq!(
            profile.link.credentials,
            Some(("tester".to_string(), "aio_test_key".to_string()))
        );
        assert_eq!(profile.queue_timeout, Duration::from_secs(366));
        assert_eq!(profile.disconnected_queue_timeout, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_disconnected_throttle_worker_polls_quickly() {
        let config = Config::for_test();
        let (events, _events_rx) = event_queue(10);
        let (signals, _rx) = command_queue(ClientId::CloudThrottle, 10);
        let worker = throttle_worker(&config.throttle, &config.cloud, signals, events);

        assert!(!worker.is_connected());
        assert_eq!(worker.queue_timeout(), Duration::from_secs(1));
    }
}
