//! Bounded queues between the dispatcher and the workers.

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, warn};

use super::{BrokerCommand, CloudCommand, PollCommand};
use crate::events::{BoolEncoding, BoolLike, ClientId, Event, Payload};

/// Errors from non-blocking queue operations.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("Queue is full: cannot add {0}")]
    Full(&'static str),

    #[error("Queue is closed")]
    Closed,
}

pub type CommandReceiver<C> = mpsc::Receiver<C>;
pub type EventReceiver = mpsc::Receiver<Event>;

/// Producer side of a worker's command queue.
#[derive(Debug)]
pub struct CommandSender<C> {
    client_id: ClientId,
    tx: mpsc::Sender<C>,
}

impl<C> Clone for CommandSender<C> {
    fn clone(&self) -> Self {
        Self {
            client_id: self.client_id,
            tx: self.tx.clone(),
        }
    }
}

/// Create a bounded command queue owned by `client_id`'s worker.
pub fn command_queue<C>(
    client_id: ClientId,
    capacity: usize,
) -> (CommandSender<C>, CommandReceiver<C>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (CommandSender { client_id, tx }, rx)
}

impl<C> CommandSender<C> {
    /// Enqueue without blocking. Returns `false` when the queue is full or
    /// its worker is gone.
    pub fn enqueue(&self, command: C) -> bool {
        match self.tx.try_send(command) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                error!(client_id = %self.client_id, "command queue is full: cannot add");
                false
            }
            Err(TrySendError::Closed(_)) => {
                warn!(client_id = %self.client_id, "command queue is closed: cannot add");
                false
            }
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn is_full(&self) -> bool {
        self.tx.capacity() == 0
    }
}

impl CommandSender<CloudCommand> {
    /// Queue a feed publish. Switch words are sent as digits.
    pub fn publish(&self, feed_id: &str, payload: impl Into<Payload>, group: Option<&str>) -> bool {
        let payload = match payload.into() {
            Payload::Text(text) => match BoolLike::parse(&text, BoolEncoding::Switch) {
                Some(value) => value.as_digit(),
                None => Payload::Text(text),
            },
            other => other,
        };
        self.enqueue(CloudCommand::Publish {
            feed_id: feed_id.to_string(),
            payload,
            group: group.map(str::to_string),
        })
    }

    /// Queue a REST fetch of a feed's last value. With a group the key
    /// becomes `group.feed`.
    pub fn fetch_feed(&self, feed_id: &str, group: Option<&str>) -> bool {
        let feed_id = match group {
            Some(group) => format!("{}.{}", group.replace('_', "-"), feed_id),
            None => feed_id.to_string(),
        };
        self.enqueue(CloudCommand::FetchFeed { feed_id })
    }

    pub fn fetch_local_time(&self) -> bool {
        self.enqueue(CloudCommand::FetchLocalTime)
    }
}

impl CommandSender<BrokerCommand> {
    /// Queue a non-retained publish on the local broker.
    pub fn publish(&self, topic: &str, payload: impl Into<Payload>) -> bool {
        self.enqueue(BrokerCommand::Publish {
            topic: topic.to_string(),
            payload: payload.into(),
            retain: false,
        })
    }
}

impl CommandSender<PollCommand> {
    pub fn fetch(&self, force: bool) -> bool {
        self.enqueue(PollCommand::FetchNow { force })
    }
}

/// Command queue health, as seen by the supervisor.
pub trait QueueStatus: Send + Sync {
    fn client_id(&self) -> ClientId;
    fn is_full(&self) -> bool;
}

impl<C: Send + 'static> QueueStatus for CommandSender<C> {
    fn client_id(&self) -> ClientId {
        CommandSender::client_id(self)
    }

    fn is_full(&self) -> bool {
        CommandSender::is_full(self)
    }
}

/// Producer side of the shared event queue.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<Event>,
}

/// Create the bounded fan-in event queue.
pub fn event_queue(capacity: usize) -> (EventSender, EventReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (EventSender { tx }, rx)
}

impl EventSender {
    /// Push an event without blocking.
    ///
    /// A full queue means the dispatcher is stuck; callers must not drop the
    /// event silently.
    pub fn put(&self, event: Event) -> Result<(), QueueError> {
        match self.tx.try_send(event) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(event)) => {
                error!(
                    event = event.name(),
                    description = event.description(),
                    "Queue is stuck, cannot add event"
                );
                Err(QueueError::Full(event.name()))
            }
            Err(TrySendError::Closed(_)) => Err(QueueError::Closed),
        }
    }
}
