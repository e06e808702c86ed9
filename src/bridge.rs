//! Bridge runtime.
//!
//! Wires the queues, workers, scheduler and dispatcher together and runs the
//! dispatcher loop until a shutdown signal arrives or the supervisor finds a
//! fatal condition.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info};

use crate::commands::{command_queue, event_queue, EventReceiver};
use crate::config::{Config, ConfigError, ScheduleConfig};
use crate::dispatch::{Dispatcher, Outbound, Router};
use crate::events::{ClientId, Event};
use crate::registry::{RegistryError, TopicRegistry};
use crate::scheduler::{
    Job, Scheduler, SchedulerError, Trigger, JOB_PERIODIC_ATTIC_CAM_KEEP_ALIVE,
    JOB_PERIODIC_CLEAR_ATTIC_MOTION, JOB_PERIODIC_EVBAYS_CLEAR_TS,
    JOB_PERIODIC_FETCH_ATTIC_MOTION, JOB_PERIODIC_FETCH_LOCAL_TIME,
};
use crate::supervisor::{Supervisor, SupervisorError};
use crate::workers::cloud::CloudWorker;
use crate::workers::local::local_worker;
use crate::workers::poller::{BaysSource, EnergySource, PollingWorker, WeatherSource};
use crate::workers::throttle::throttle_worker;
use crate::workers::WorkerError;

/// Errors that end the bridge.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error("Worker setup failed: {0}")]
    Worker(#[from] WorkerError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("Invalid topic table: {0}")]
    Registry(#[from] RegistryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Event queue closed")]
    EventQueueClosed,
}

/// Register the periodic jobs. Each replaces any job with the same id.
pub fn register_periodic_jobs(
    scheduler: &Scheduler,
    schedule: &ScheduleConfig,
    bays_enabled: bool,
) -> Result<(), SchedulerError> {
    let minutes = |m: u64| Duration::from_secs(m * 60);

    scheduler.add_job(
        JOB_PERIODIC_CLEAR_ATTIC_MOTION,
        Job::ClearAtticMotion,
        Trigger::cron(&schedule.clear_attic_motion_cron)?,
        true,
    )?;
    scheduler.add_job(
        JOB_PERIODIC_ATTIC_CAM_KEEP_ALIVE,
        Job::AtticCamKeepAlive,
        Trigger::cron(&schedule.attic_cam_keep_alive_cron)?,
        true,
    )?;
    if bays_enabled {
        scheduler.add_job(
            JOB_PERIODIC_EVBAYS_CLEAR_TS,
            Job::EvBaysClearTimestamps,
            Trigger::cron(&schedule.evbays_clear_ts_cron)?,
            true,
        )?;
    }
    scheduler.add_job(
        JOB_PERIODIC_FETCH_ATTIC_MOTION,
        Job::FetchAtticMotionValue,
        Trigger::interval(
            minutes(schedule.fetch_attic_motion_interval_mins),
            minutes(schedule.fetch_attic_motion_first_run_mins),
        ),
        true,
    )?;
    scheduler.add_job(
        JOB_PERIODIC_FETCH_LOCAL_TIME,
        Job::FetchLocalTime,
        Trigger::interval(
            minutes(schedule.fetch_local_time_interval_mins),
            minutes(schedule.fetch_local_time_first_run_mins),
        ),
        true,
    )?;
    Ok(())
}

/// Run the bridge until shutdown. Returns an error for any condition the
/// process manager should restart on.
pub async fn run(config: Config) -> Result<(), BridgeError> {
    let registry = TopicRegistry::standard()?;
    let (events, events_rx) = event_queue(config.supervisor.event_queue_size);
    let mut supervisor = Supervisor::new(
        config.supervisor.max_disconnect(),
        config.supervisor.shutdown_grace(),
    );

    let (local_tx, local_rx) = command_queue(ClientId::LocalBroker, config.local.queue_size);
    let local = local_worker(&config.local, &registry, local_tx.clone(), events.clone());
    supervisor.spawn(local, local_rx, local_tx.clone());

    let (cloud_tx, cloud_rx) = command_queue(ClientId::Cloud, config.cloud.queue_size);
    let cloud = CloudWorker::new(&config.cloud, &registry, cloud_tx.clone(), events.clone())?;
    supervisor.spawn(cloud, cloud_rx, cloud_tx.clone());

    let (throttle_tx, throttle_rx) =
        command_queue(ClientId::CloudThrottle, config.throttle.queue_size);
    let throttle = throttle_worker(
        &config.throttle,
        &config.cloud,
        throttle_tx.clone(),
        events.clone(),
    );
    supervisor.spawn(throttle, throttle_rx, throttle_tx);

    let weather = match WeatherSource::new(&config.weather)? {
        Some(source) => {
            let (tx, rx) = command_queue(ClientId::Weather, config.weather.queue_size);
            let worker = PollingWorker::new(
                source,
                config.weather.interval(),
                config.weather.timeout(),
                events.clone(),
            );
            supervisor.spawn(worker, rx, tx.clone());
            Some(tx)
        }
        None => {
            info!("Weather source not configured");
            None
        }
    };

    let energy = match EnergySource::new(&config.energy)? {
        Some(source) => {
            let (tx, rx) = command_queue(ClientId::Energy, config.energy.queue_size);
            let worker = PollingWorker::new(
                source,
                config.energy.interval(),
                config.energy.timeout(),
                events.clone(),
            );
            supervisor.spawn(worker, rx, tx.clone());
            Some(tx)
        }
        None => {
            info!("Energy source not configured");
            None
        }
    };

    let bays = match BaysSource::new(&config.bays) {
        Some(source) => {
            let (tx, rx) = command_queue(ClientId::ParkingBays, config.bays.queue_size);
            let worker = PollingWorker::new(
                source,
                config.bays.interval(),
                config.bays.interval(),
                events.clone(),
            );
            supervisor.spawn(worker, rx, tx.clone());
            Some(tx)
        }
        None => {
            info!("Parking bays source not configured");
            None
        }
    };

    let scheduler = Arc::new(Scheduler::new(events));
    register_periodic_jobs(&scheduler, &config.schedule, bays.is_some())?;

    let outbound = Outbound {
        local: local_tx,
        cloud: cloud_tx,
        weather,
        energy,
        bays,
    };
    let dispatcher = Dispatcher::new(
        Router::new(registry, &config.schedule),
        outbound,
        Arc::clone(&scheduler),
        config.commands.clone(),
    );

    info!(workers = ?supervisor.client_ids(), "Bridge started");
    let result = dispatch_loop(
        dispatcher,
        &mut supervisor,
        &scheduler,
        events_rx,
        config.supervisor.event_queue_timeout(),
        config.supervisor.sweep_interval(),
    )
    .await;

    scheduler.shutdown();
    supervisor.shutdown().await;
    match &result {
        Ok(()) => info!("Bridge stopped"),
        Err(e) => error!(error = %e, "Bridge stopped on error"),
    }
    result
}

async fn dispatch_loop(
    mut dispatcher: Dispatcher,
    supervisor: &mut Supervisor,
    scheduler: &Scheduler,
    mut events: EventReceiver,
    read_timeout: Duration,
    sweep_interval: Duration,
) -> Result<(), BridgeError> {
    let mut sweep = interval_at(Instant::now() + sweep_interval, sweep_interval);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                let name = signal?;
                info!(signal = name, "Shutdown requested");
                return Ok(());
            }
            _ = sweep.tick() => {
                supervisor.sweep(Instant::now())?;
                scheduler.check()?;
            }
            received = tokio::time::timeout(read_timeout, events.recv()) => match received {
                Ok(Some(event)) => {
                    if let Event::MqttConnect { client_id, status, .. } = &event {
                        supervisor.on_connection(*client_id, *status, Instant::now());
                    }
                    dispatcher.process(event).await;
                }
                Ok(None) => return Err(BridgeError::EventQueueClosed),
                Err(_) => debug!("No events"),
            },
        }
    }
}

#[cfg(unix)]
async fn shutdown_signal() -> Result<&'static str, std::io::Error> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> Result<&'static str, std::io::Error> {
    tokio::signal::ctrl_c().await?;
    Ok("ctrl-c")
}
