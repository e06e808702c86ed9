//! Shared utilities for integration tests.
//!
//! Builds a dispatcher wired to real command queues and a real scheduler,
//! with no network clients behind the queues.

#![allow(dead_code)]

use std::sync::Arc;

use adabridge::commands::{
    command_queue, event_queue, BrokerCommand, CloudCommand, CommandReceiver, EventReceiver,
    PollCommand,
};
use adabridge::config::{CommandsConfig, ScheduleConfig};
use adabridge::dispatch::{Dispatcher, Outbound, Router};
use adabridge::events::{ClientId, Payload};
use adabridge::registry::TopicRegistry;
use adabridge::scheduler::Scheduler;

/// Dispatcher plus the far ends of every queue it talks to.
pub struct Bridge {
    pub dispatcher: Dispatcher,
    pub scheduler: Arc<Scheduler>,
    pub events: EventReceiver,
    pub local: CommandReceiver<BrokerCommand>,
    pub cloud: CommandReceiver<CloudCommand>,
    pub weather: CommandReceiver<PollCommand>,
    pub energy: CommandReceiver<PollCommand>,
    pub bays: CommandReceiver<PollCommand>,
}

pub fn bridge() -> Bridge {
    let (events_tx, events) = event_queue(100);
    let (local_tx, local) = command_queue(ClientId::LocalBroker, 100);
    let (cloud_tx, cloud) = command_queue(ClientId::Cloud, 100);
    let (weather_tx, weather) = command_queue(ClientId::Weather, 10);
    let (energy_tx, energy) = command_queue(ClientId::Energy, 10);
    let (bays_tx, bays) = command_queue(ClientId::ParkingBays, 10);
    let scheduler = Arc::new(Scheduler::new(events_tx));

    let outbound = Outbound {
        local: local_tx,
        cloud: cloud_tx,
        weather: Some(weather_tx),
        energy: Some(energy_tx),
        bays: Some(bays_tx),
    };
    let router = Router::new(
        TopicRegistry::standard().expect("standard registry"),
        &ScheduleConfig::default(),
    );

    Bridge {
        dispatcher: Dispatcher::new(
            router,
            outbound,
            Arc::clone(&scheduler),
            CommandsConfig::default(),
        ),
        scheduler,
        events,
        local,
        cloud,
        weather,
        energy,
        bays,
    }
}

/// Everything currently waiting on a queue.
pub fn drain<C>(rx: &mut CommandReceiver<C>) -> Vec<C> {
    let mut out = Vec::new();
    while let Ok(command) = rx.try_recv() {
        out.push(command);
    }
    out
}

pub fn cloud_publish(feed_id: &str, payload: impl Into<Payload>, group: &str) -> CloudCommand {
    CloudCommand::Publish {
        feed_id: feed_id.to_string(),
        payload: payload.into(),
        group: Some(group.to_string()),
    }
}

pub fn local_publish(topic: &str, payload: impl Into<Payload>) -> BrokerCommand {
    BrokerCommand::Publish {
        topic: topic.to_string(),
        payload: payload.into(),
        retain: false,
    }
}

/// A bay status document in the scraper's format.
pub fn stations(list: &[(&str, &str)]) -> String {
    let stations: Vec<_> = list
        .iter()
        .map(|(name, status)| serde_json::json!({"name": name, "status": status}))
        .collect();
    serde_json::json!({"aaData": {"stations": stations}}).to_string()
}
