//! Polling-source workers.
//!
//! A [`PollSource`] knows how to fetch one external source and turn the
//! result into events. [`PollingWorker`] runs it on an interval and on
//! demand, under a hard timeout per fetch.

mod bays;
mod energy;
mod weather;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;
use tracing::{debug, warn};

pub use bays::BaysSource;
pub use energy::{EnergySource, SenseSession};
pub use weather::WeatherSource;

use super::{ClientWorker, WorkerError};
use crate::commands::{EventSender, PollCommand};
use crate::events::{ClientId, Event};

/// One pollable data source.
#[async_trait]
pub trait PollSource: Send {
    fn client_id(&self) -> ClientId;

    /// Fetch the source. With `force` a source that suppresses unchanged
    /// data must emit anyway.
    async fn fetch(&mut self, force: bool) -> Result<Vec<Event>, WorkerError>;

    /// Pause between consecutive emitted events.
    fn emit_spacing(&self) -> Duration {
        Duration::ZERO
    }
}

pub struct PollingWorker<S> {
    source: S,
    interval: Duration,
    timeout: Duration,
    last_attempt: Instant,
    last_success: Option<Instant>,
    events: EventSender,
}

impl<S: PollSource> PollingWorker<S> {
    /// The first scheduled poll happens one `interval` after creation.
    pub fn new(source: S, interval: Duration, timeout: Duration, events: EventSender) -> Self {
        Self {
            source,
            interval,
            timeout,
            last_attempt: Instant::now(),
            last_success: None,
            events,
        }
    }

    pub fn last_success(&self) -> Option<Instant> {
        self.last_success
    }

    async fn poll(&mut self, force: bool) -> Result<(), WorkerError> {
        self.last_attempt = Instant::now();
        let client_id = self.source.client_id();
        let events = match tokio::time::timeout(self.timeout, self.source.fetch(force)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(client_id = %client_id, timeout = ?self.timeout, "Fetch timed out");
                return Err(WorkerError::Timeout(self.timeout));
            }
        };
        self.last_success = Some(Instant::now());
        debug!(client_id = %client_id, count = events.len(), force, "Fetched");

        let spacing = self.source.emit_spacing();
        for (i, event) in events.into_iter().enumerate() {
            if i > 0 && !spacing.is_zero() {
                tokio::time::sleep(spacing).await;
            }
            self.events.put(event)?;
        }
        Ok(())
    }
}

#[async_trait]
impl<S: PollSource> ClientWorker for PollingWorker<S> {
    type Command = PollCommand;

    fn client_id(&self) -> ClientId {
        self.source.client_id()
    }

    async fn maintain(&mut self) -> Result<(), WorkerError> {
        Ok(())
    }

    fn queue_timeout(&self) -> Duration {
        self.interval.saturating_sub(self.last_attempt.elapsed())
    }

    async fn execute(&mut self, command: PollCommand) -> Result<(), WorkerError> {
        match command {
            PollCommand::FetchNow { force } => self.poll(force).await,
        }
    }

    async fn on_idle(&mut self) -> Result<(), WorkerError> {
        if self.last_attempt.elapsed() >= self.interval {
            self.poll(false).await
        } else {
            Ok(())
        }
    }
}
