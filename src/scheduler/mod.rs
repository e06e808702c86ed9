//! Job scheduler.
//!
//! Runs named jobs on interval, cron or one-shot triggers. A job firing does
//! not act directly: it pushes [`Event::Scheduled`] onto the shared event
//! queue so every side effect still happens in the dispatcher's context.
//!
//! Semantics:
//! - `replace_existing` cancels a pending job with the same id before adding
//!   the new one. Without it a duplicate id is rejected.
//! - Only one instance of a job is ever in flight (one task per id).
//! - Missed runs coalesce: a late interval or cron job fires once, not once
//!   per missed slot.
//! - A job that cannot put its event on the queue stops for good and is
//!   reported by [`Scheduler::check`]. A full event queue means the
//!   dispatcher is stuck, so the bridge treats this as fatal.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Local;
use cron::Schedule;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::commands::{EventSender, QueueError};
use crate::events::Event;

// ============================================================================
// Job identifiers
// ============================================================================

pub const JOB_PERIODIC_CLEAR_ATTIC_MOTION: &str = "periodic_clear_attic_motion";
pub const JOB_PERIODIC_ATTIC_CAM_KEEP_ALIVE: &str = "periodic_attic_cam_keep_alive";
pub const JOB_PERIODIC_EVBAYS_CLEAR_TS: &str = "periodic_evbays_clear_ts";
pub const JOB_PERIODIC_FETCH_ATTIC_MOTION: &str = "periodic_fetch_attic_motion_value";
pub const JOB_PERIODIC_FETCH_LOCAL_TIME: &str = "periodic_fetch_local_time";
pub const JOB_CLEAR_ATTIC_MOTION: &str = "clear_attic_motion";
pub const JOB_VERIFY_ATTIC_MOTION: &str = "verify_attic_motion";

/// Work a scheduled job asks the dispatcher to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Job {
    /// Publish `0` to the attic motion feed (the cloud never sends "off").
    ClearAtticMotion,
    /// Publish a keep-alive to the attic camera feed.
    AtticCamKeepAlive,
    /// Reset the parking-bay "simple time" feeds.
    EvBaysClearTimestamps,
    /// Fetch the attic motion feed's last value over REST.
    FetchAtticMotionValue,
    /// Fetch local time from the cloud time service.
    FetchLocalTime,
}

/// Errors raised when registering jobs.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidCron { expr: String, reason: String },

    #[error("Job '{0}' already scheduled")]
    DuplicateJob(String),

    #[error("Job '{id}' stopped: {reason}")]
    JobStopped { id: String, reason: QueueError },
}

/// When a job fires.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// Every `every`, first firing after `first_run`.
    Interval { every: Duration, first_run: Duration },
    /// Calendar schedule, evaluated in local time.
    Cron(Box<Schedule>),
    /// Once, after `delay`.
    Once { delay: Duration },
}

impl Trigger {
    /// Parse a cron expression (`sec min hour day-of-month month day-of-week`).
    pub fn cron(expr: &str) -> Result<Self, SchedulerError> {
        Schedule::from_str(expr)
            .map(|schedule| Trigger::Cron(Box::new(schedule)))
            .map_err(|e| SchedulerError::InvalidCron {
                expr: expr.to_string(),
                reason: e.to_string(),
            })
    }

    pub fn interval(every: Duration, first_run: Duration) -> Self {
        Trigger::Interval { every, first_run }
    }

    pub fn once(delay: Duration) -> Self {
        Trigger::Once { delay }
    }
}

struct JobEntry {
    generation: u64,
    task: JoinHandle<()>,
}

type JobTable = Arc<Mutex<HashMap<String, JobEntry>>>;
type StoppedJobs = Arc<Mutex<Vec<(String, QueueError)>>>;

/// Runs jobs as tokio tasks and reports them on the event queue.
pub struct Scheduler {
    jobs: JobTable,
    stopped: StoppedJobs,
    sink: EventSender,
    generation: AtomicU64,
}

impl Scheduler {
    pub fn new(sink: EventSender) -> Self {
        Self {
            jobs: Arc::new(Mutex::new(HashMap::new())),
            stopped: Arc::new(Mutex::new(Vec::new())),
            sink,
            generation: AtomicU64::new(0),
        }
    }

    /// Register `job` under `id`.
    pub fn add_job(
        &self,
        id: &str,
        job: Job,
        trigger: Trigger,
        replace_existing: bool,
    ) -> Result<(), SchedulerError> {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(existing) = jobs.get(id) {
            if !replace_existing && !existing.task.is_finished() {
                return Err(SchedulerError::DuplicateJob(id.to_string()));
            }
        }
        if let Some(previous) = jobs.remove(id) {
            previous.task.abort();
            debug!(job_id = %id, "Replaced scheduled job");
        }

        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let task = self.spawn(id.to_string(), generation, job, trigger);
        jobs.insert(id.to_string(), JobEntry { generation, task });
        debug!(job_id = %id, job = ?job, "Scheduled job");
        Ok(())
    }

    /// Cancel a job. Returns whether it existed.
    pub fn remove_job(&self, id: &str) -> bool {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        match jobs.remove(id) {
            Some(entry) => {
                entry.task.abort();
                true
            }
            None => false,
        }
    }

    /// Ids of pending jobs, sorted.
    pub fn job_ids(&self) -> Vec<String> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let mut ids: Vec<String> = jobs
            .iter()
            .filter(|(_, entry)| !entry.task.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Fails with the first job that stopped because its event could not be
    /// queued.
    pub fn check(&self) -> Result<(), SchedulerError> {
        let stopped = self.stopped.lock().unwrap_or_else(PoisonError::into_inner);
        match stopped.first() {
            Some((id, reason)) => Err(SchedulerError::JobStopped {
                id: id.clone(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Cancel every job without waiting.
    pub fn shutdown(&self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in jobs.drain() {
            entry.task.abort();
        }
        info!("Scheduler stopped");
    }

    fn spawn(&self, id: String, generation: u64, job: Job, trigger: Trigger) -> JoinHandle<()> {
        let sink = self.sink.clone();
        let jobs = Arc::clone(&self.jobs);
        let stopped = Arc::clone(&self.stopped);

        match trigger {
            Trigger::Once { delay } => tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                {
                    let mut jobs = jobs.lock().unwrap_or_else(PoisonError::into_inner);
                    if jobs.get(&id).map(|e| e.generation) == Some(generation) {
                        jobs.remove(&id);
                    }
                }
                if let Err(e) = fire(&sink, &id, job) {
                    record_stop(&stopped, id, e);
                }
            }),
            Trigger::Interval { every, first_run } => tokio::spawn(async move {
                let mut ticker = interval_at(Instant::now() + first_run, every);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                loop {
                    ticker.tick().await;
                    if let Err(e) = fire(&sink, &id, job) {
                        record_stop(&stopped, id, e);
                        return;
                    }
                }
            }),
            Trigger::Cron(schedule) => tokio::spawn(async move {
                loop {
                    let Some(next) = schedule.upcoming(Local).next() else {
                        info!(job_id = %id, "Cron schedule exhausted");
                        return;
                    };
                    let wait = (next - Local::now()).to_std().unwrap_or(Duration::ZERO);
                    debug!(job_id = %id, next = %next, "Next cron run");
                    tokio::time::sleep(wait).await;
                    if let Err(e) = fire(&sink, &id, job) {
                        record_stop(&stopped, id, e);
                        return;
                    }
                    // Step past the fired slot before asking for the next one.
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }),
        }
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        for (_, entry) in jobs.drain() {
            entry.task.abort();
        }
    }
}

fn fire(sink: &EventSender, id: &str, job: Job) -> Result<(), QueueError> {
    debug!(job_id = %id, job = ?job, "Job fired");
    sink.put(Event::Scheduled { job })
}

fn record_stop(stopped: &StoppedJobs, id: String, reason: QueueError) {
    error!(job_id = %id, error = %reason, "Scheduled job stopped");
    stopped
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push((id, reason));
}

#[cfg(test)]
mod tests;
