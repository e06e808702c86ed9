//! Dispatcher, supervisor and scheduler configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Event queue and liveness sweep.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// Shared event queue capacity.
    pub event_queue_size: usize,
    /// Event queue read timeout in seconds.
    pub event_queue_timeout_secs: u64,
    /// Seconds between liveness sweeps.
    pub sweep_interval_secs: u64,
    /// Minutes a worker may stay disconnected before the bridge exits.
    pub max_disconnect_mins: u64,
    /// Seconds to wait for workers to stop on shutdown.
    pub shutdown_grace_secs: u64,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            event_queue_size: 1000,
            event_queue_timeout_secs: 15,
            sweep_interval_secs: 66,
            max_disconnect_mins: 20,
            shutdown_grace_secs: 5,
        }
    }
}

impl SupervisorConfig {
    pub fn event_queue_timeout(&self) -> Duration {
        Duration::from_secs(self.event_queue_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn max_disconnect(&self) -> Duration {
        Duration::from_secs(self.max_disconnect_mins * 60)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

/// Periodic and one-shot job timings.
///
/// Cron expressions use six fields: `sec min hour day-of-month month day-of-week`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    pub clear_attic_motion_cron: String,
    pub attic_cam_keep_alive_cron: String,
    pub evbays_clear_ts_cron: String,
    pub fetch_attic_motion_interval_mins: u64,
    pub fetch_attic_motion_first_run_mins: u64,
    pub fetch_local_time_interval_mins: u64,
    pub fetch_local_time_first_run_mins: u64,
    /// Delay before clearing attic motion after an "on".
    pub clear_attic_motion_delay_secs: u64,
    /// Delay before re-reading attic motion after an "on".
    pub verify_attic_motion_delay_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            clear_attic_motion_cron: "45 23 13 * * Wed,Sun".to_string(),
            attic_cam_keep_alive_cron: "45 23 13 * * Mon,Thu".to_string(),
            evbays_clear_ts_cron: "23 23 23 * * *".to_string(),
            fetch_attic_motion_interval_mins: 33,
            fetch_attic_motion_first_run_mins: 22,
            fetch_local_time_interval_mins: 55,
            fetch_local_time_first_run_mins: 30,
            clear_attic_motion_delay_secs: 10,
            verify_attic_motion_delay_secs: 15,
        }
    }
}

impl ScheduleConfig {
    pub fn clear_attic_motion_delay(&self) -> Duration {
        Duration::from_secs(self.clear_attic_motion_delay_secs)
    }

    pub fn verify_attic_motion_delay(&self) -> Duration {
        Duration::from_secs(self.verify_attic_motion_delay_secs)
    }
}

/// Actions behind the local command topics, plus dispatcher pacing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandsConfig {
    /// Script restarting the ring-mqtt service.
    pub ring_restart_script: PathBuf,
    /// Hard timeout for the restart script.
    pub ring_restart_timeout_secs: u64,
    /// Dispatcher pause after a throttle notice, in seconds.
    pub throttle_pause_secs: u64,
}

impl Default for CommandsConfig {
    fn default() -> Self {
        Self {
            ring_restart_script: PathBuf::from("/vagrant/ada/bin/svc_restart_ring-mqtt.sh"),
            ring_restart_timeout_secs: 10,
            throttle_pause_secs: 5,
        }
    }
}

impl CommandsConfig {
    pub fn ring_restart_timeout(&self) -> Duration {
        Duration::from_secs(self.ring_restart_timeout_secs)
    }

    pub fn throttle_pause(&self) -> Duration {
        Duration::from_secs(self.throttle_pause_secs)
    }
}
