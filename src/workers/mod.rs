//! Client workers.
//!
//! A worker owns exactly one external connection (an MQTT session, an HTTP
//! source) and the command queue feeding it. Workers never call each other:
//! they report upward by pushing events onto the shared event queue and
//! receive work through their own bounded command queue.
//!
//! Every worker runs the same loop (see [`run_worker`]):
//! 1. `maintain` the connection (create, tear down, resubscribe).
//! 2. Wait for one command, bounded by the worker's queue timeout.
//! 3. Execute it, or run `on_idle` when the wait timed out.
//!
//! Command failures are logged and the loop keeps going. Only a stuck event
//! queue ends the worker with an error, which the supervisor then observes.

pub mod broker;
pub mod cloud;
pub mod local;
pub mod mqtt;
pub mod poller;
pub mod throttle;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandReceiver, QueueError};
use crate::events::ClientId;

/// Errors raised inside a worker.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("Event queue is full: cannot add {0}")]
    EventQueueFull(String),

    #[error("Event queue is closed")]
    EventQueueClosed,

    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    #[error("Source error: {0}")]
    Source(String),
}

impl WorkerError {
    /// Whether the worker must stop. Only a stuck or closed event queue is
    /// fatal; every other failure is retried on a later iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            WorkerError::EventQueueFull(_) | WorkerError::EventQueueClosed
        )
    }
}

impl From<QueueError> for WorkerError {
    fn from(e: QueueError) -> Self {
        match e {
            QueueError::Full(name) => WorkerError::EventQueueFull(name.to_string()),
            QueueError::Closed => WorkerError::EventQueueClosed,
        }
    }
}

/// A connection owner driven by [`run_worker`].
#[async_trait]
pub trait ClientWorker: Send {
    type Command: Send + Debug + 'static;

    fn client_id(&self) -> ClientId;

    /// Bring the connection to its desired state. Called before every wait.
    async fn maintain(&mut self) -> Result<(), WorkerError>;

    /// How long to wait for the next command.
    fn queue_timeout(&self) -> Duration;

    async fn execute(&mut self, command: Self::Command) -> Result<(), WorkerError>;

    /// Called when no command arrived within [`queue_timeout`](Self::queue_timeout).
    async fn on_idle(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    /// Best-effort release of the connection.
    async fn shutdown(&mut self) {}
}

enum Step {
    Continue,
    Stop,
}

/// Drive `worker` until shutdown is signalled, its command queue closes or a
/// fatal error occurs.
pub async fn run_worker<W: ClientWorker>(
    mut worker: W,
    mut commands: CommandReceiver<W::Command>,
    mut shutdown: watch::Receiver<bool>,
) -> Result<(), WorkerError> {
    let client_id = worker.client_id();
    info!(client_id = %client_id, "Worker started");

    let result = loop {
        if *shutdown.borrow() {
            break Ok(());
        }
        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break Ok(());
                }
            }
            step = iterate(&mut worker, &mut commands) => match step {
                Ok(Step::Continue) => {}
                Ok(Step::Stop) => {
                    info!(client_id = %client_id, "Command queue closed");
                    break Ok(());
                }
                Err(e) => break Err(e),
            }
        }
    };

    worker.shutdown().await;
    match &result {
        Ok(()) => info!(client_id = %client_id, "Worker stopped"),
        Err(e) => error!(client_id = %client_id, error = %e, "Worker failed"),
    }
    result
}

async fn iterate<W: ClientWorker>(
    worker: &mut W,
    commands: &mut CommandReceiver<W::Command>,
) -> Result<Step, WorkerError> {
    let client_id = worker.client_id();

    if let Err(e) = worker.maintain().await {
        if e.is_fatal() {
            return Err(e);
        }
        warn!(client_id = %client_id, error = %e, "Connection maintenance failed");
    }

    let outcome = match tokio::time::timeout(worker.queue_timeout(), commands.recv()).await {
        Ok(Some(command)) => {
            debug!(client_id = %client_id, command = ?command, "Executing command");
            worker.execute(command).await
        }
        Ok(None) => return Ok(Step::Stop),
        Err(_) => worker.on_idle().await,
    };

    match outcome {
        Ok(()) => Ok(Step::Continue),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            error!(client_id = %client_id, error = %e, "Command failed");
            Ok(Step::Continue)
        }
    }
}
