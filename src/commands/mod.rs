//! Command queue protocol.
//!
//! A command is a deferred action executed inside the single task that owns a
//! network connection. Each worker kind accepts one closed command enum; all
//! of them are plain serde data so the command surface stays auditable.
//!
//! Queues are bounded. Producers never block: a full command queue rejects
//! the command and reports `false`, while a full event queue is an error the
//! producing worker must treat as fatal.

mod queue;

use serde::{Deserialize, Serialize};

use crate::events::{ConnectionStatus, Payload};

pub use queue::{
    command_queue, event_queue, CommandReceiver, CommandSender, EventReceiver, EventSender,
    QueueError, QueueStatus,
};

/// Signals raised by an MQTT connection's I/O task, delivered to the owning
/// worker through its own command queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LinkSignal {
    /// A message arrived on a subscribed topic.
    Inbound { topic: String, payload: String },
    /// The connection came up or went down.
    Connection {
        status: ConnectionStatus,
        reason: Option<String>,
    },
}

/// Commands accepted by MQTT broker workers (local broker, throttle notifier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BrokerCommand {
    /// Publish `payload` on `topic` at the worker's QoS.
    Publish {
        topic: String,
        payload: Payload,
        retain: bool,
    },
    Link(LinkSignal),
}

/// Commands accepted by the cloud worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CloudCommand {
    /// Publish to `feed_id`, optionally inside `group`.
    Publish {
        feed_id: String,
        payload: Payload,
        group: Option<String>,
    },
    /// Fetch the last value of a (group-qualified) feed over REST and report
    /// it as an inbound message.
    FetchFeed { feed_id: String },
    /// Ask the cloud time service for the current local time.
    FetchLocalTime,
    Link(LinkSignal),
}

/// Commands accepted by polling-source workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PollCommand {
    /// Poll the source now. `force` emits even when nothing changed.
    FetchNow { force: bool },
}

impl From<LinkSignal> for BrokerCommand {
    fn from(signal: LinkSignal) -> Self {
        BrokerCommand::Link(signal)
    }
}

impl From<LinkSignal> for CloudCommand {
    fn from(signal: LinkSignal) -> Self {
        CloudCommand::Link(signal)
    }
}
