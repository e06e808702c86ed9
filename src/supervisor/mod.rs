//! Worker supervision.
//!
//! Keeps one [`WorkerHandle`] per spawned worker and decides when the bridge
//! as a whole must stop: a worker task ended, a command queue is full, or a
//! connection has been down for longer than allowed. Restarting is left to
//! the process manager running the bridge.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::commands::{CommandReceiver, CommandSender, QueueStatus};
use crate::events::{ClientId, ConnectionStatus};
use crate::workers::{run_worker, ClientWorker, WorkerError};

/// Conditions that end the bridge.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SupervisorError {
    #[error("{0} worker is no longer running")]
    WorkerDied(ClientId),

    #[error("{0} command queue is full")]
    CommandQueueFull(ClientId),

    #[error("{client_id} has been disconnected for {minutes} minutes")]
    DisconnectedTooLong { client_id: ClientId, minutes: u64 },
}

/// A running worker as seen by the supervisor.
pub struct WorkerHandle {
    client_id: ClientId,
    task: JoinHandle<Result<(), WorkerError>>,
    queue: Box<dyn QueueStatus>,
    disconnected_since: Option<Instant>,
}

impl WorkerHandle {
    /// MQTT workers count as disconnected until their first connect.
    pub fn new(
        task: JoinHandle<Result<(), WorkerError>>,
        queue: Box<dyn QueueStatus>,
    ) -> Self {
        let client_id = queue.client_id();
        Self {
            client_id,
            task,
            queue,
            disconnected_since: client_id.is_mqtt().then(Instant::now),
        }
    }

    pub fn client_id(&self) -> ClientId {
        self.client_id
    }

    pub fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }
}

pub struct Supervisor {
    workers: Vec<WorkerHandle>,
    max_disconnect: Duration,
    shutdown_grace: Duration,
    shutdown_tx: watch::Sender<bool>,
}

impl Supervisor {
    pub fn new(max_disconnect: Duration, shutdown_grace: Duration) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            workers: Vec::new(),
            max_disconnect,
            shutdown_grace,
            shutdown_tx,
        }
    }

    /// Receiver that flips to `true` when workers must stop.
    pub fn shutdown_signal(&self) -> watch::Receiver<bool> {
        self.shutdown_tx.subscribe()
    }

    /// Spawn `worker` on its command queue and start watching it.
    pub fn spawn<W>(
        &mut self,
        worker: W,
        commands: CommandReceiver<W::Command>,
        queue: CommandSender<W::Command>,
    ) where
        W: ClientWorker + 'static,
    {
        let task = tokio::spawn(run_worker(worker, commands, self.shutdown_signal()));
        self.register(WorkerHandle::new(task, Box::new(queue)));
    }

    pub fn register(&mut self, handle: WorkerHandle) {
        info!(client_id = %handle.client_id, "Supervising worker");
        self.workers.push(handle);
    }

    pub fn client_ids(&self) -> Vec<ClientId> {
        self.workers.iter().map(WorkerHandle::client_id).collect()
    }

    /// Track connection state for the disconnect limit.
    pub fn on_connection(&mut self, client_id: ClientId, status: ConnectionStatus, now: Instant) {
        for handle in self.workers.iter_mut().filter(|h| h.client_id == client_id) {
            handle.disconnected_since = match status {
                ConnectionStatus::Connected => None,
                ConnectionStatus::Disconnected => handle.disconnected_since.or(Some(now)),
            };
        }
    }

    /// Liveness check over every worker. The first problem found is returned.
    pub fn sweep(&self, now: Instant) -> Result<(), SupervisorError> {
        for handle in &self.workers {
            if !handle.is_alive() {
                error!(client_id = %handle.client_id, "Worker is not alive");
                return Err(SupervisorError::WorkerDied(handle.client_id));
            }
            if handle.queue.is_full() {
                error!(client_id = %handle.client_id, "Worker command queue is full");
                return Err(SupervisorError::CommandQueueFull(handle.client_id));
            }
            match handle.disconnected_since {
                Some(since) => {
                    let down = now.saturating_duration_since(since);
                    let minutes = down.as_secs() / 60;
                    if down > self.max_disconnect {
                        error!(client_id = %handle.client_id, minutes, "Disconnected for too long");
                        return Err(SupervisorError::DisconnectedTooLong {
                            client_id: handle.client_id,
                            minutes,
                        });
                    }
                    warn!(client_id = %handle.client_id, minutes, "Worker has been disconnected");
                }
                None => debug!(client_id = %handle.client_id, "Worker is ok"),
            }
        }
        Ok(())
    }

    /// Signal every worker to stop and wait up to the grace period for each.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.workers {
            let client_id = handle.client_id;
            let abort = handle.task.abort_handle();
            match tokio::time::timeout(self.shutdown_grace, handle.task).await {
                Ok(Ok(Ok(()))) => debug!(client_id = %client_id, "Worker joined"),
                Ok(Ok(Err(e))) => warn!(client_id = %client_id, error = %e, "Worker had failed"),
                Ok(Err(e)) => warn!(client_id = %client_id, error = %e, "Worker task panicked"),
                Err(_) => {
                    warn!(client_id = %client_id, "Worker did not stop in time");
                    abort.abort();
                }
            }
        }
        info!("All workers stopped");
    }
}

#[cfg(test)]
mod tests;
