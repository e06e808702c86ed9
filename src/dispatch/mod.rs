//! Dispatcher.
//!
//! Consumes events from the shared queue and turns them into commands for
//! the workers. Routing of MQTT messages is a pure function ([`Router`]) that
//! yields [`Directive`]s; [`Dispatcher`] then carries them out, alongside the
//! side effects of the other event kinds.
//!
//! ## Routing
//! - Local broker messages resolve through the registry. Each group of the
//!   entry runs its handler on the original feed id and payload, and every
//!   non-empty result is published to the cloud under that group.
//! - Cloud messages resolve by exact feed id. Attic motion `1` arms a delayed
//!   clear and a delayed verification fetch. The `current` forecast gets a
//!   precipitation percentage, everything else maps `1`/`0` to `on`/`off`.

pub mod bays;
pub mod handlers;
pub mod weather;

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, error, info, warn};

pub use bays::{BayState, BaysUpdate, ChangedBay};
pub use handlers::{HandlerOutput, LocalAction};

use crate::commands::{BrokerCommand, CloudCommand, CommandSender, PollCommand};
use crate::config::{CommandsConfig, ScheduleConfig};
use crate::events::{translate_text, BoolEncoding, ClientId, ConnectionStatus, Event, Payload};
use crate::registry::{
    extract_feed_id, Group, TopicRegistry, FEED_ATTIC_CAMERA_SHORT, FEED_ATTIC_MOTION,
    FEED_ATTIC_MOTION_SHORT, TOPIC_CONNECTION, TOPIC_LOCAL_TIME, TOPIC_WEATHER_CURRENT,
};
use crate::scheduler::{
    Job, Scheduler, Trigger, JOB_CLEAR_ATTIC_MOTION, JOB_VERIFY_ATTIC_MOTION,
};

/// Number of parking bays with a "simple time" feed.
const BAY_COUNT: usize = 6;

// ============================================================================
// Routing
// ============================================================================

/// One thing the dispatcher must do in response to a message.
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    CloudPublish {
        feed_id: String,
        payload: Payload,
        group: &'static str,
    },
    LocalPublish {
        topic: &'static str,
        payload: Payload,
    },
    Schedule {
        id: &'static str,
        job: Job,
        delay: Duration,
    },
    Run(LocalAction),
}

/// Pure message router over the topic registry.
#[derive(Debug, Clone)]
pub struct Router {
    registry: TopicRegistry,
    clear_attic_delay: Duration,
    verify_attic_delay: Duration,
}

impl Router {
    pub fn new(registry: TopicRegistry, schedule: &ScheduleConfig) -> Self {
        Self {
            registry,
            clear_attic_delay: schedule.clear_attic_motion_delay(),
            verify_attic_delay: schedule.verify_attic_motion_delay(),
        }
    }

    pub fn registry(&self) -> &TopicRegistry {
        &self.registry
    }

    /// Directives for a message received by `client_id`.
    pub fn route(&self, client_id: ClientId, topic: &str, payload: &str) -> Vec<Directive> {
        match client_id {
            ClientId::LocalBroker => self.route_local(topic, payload),
            ClientId::Cloud => self.route_remote(topic, payload),
            other => {
                debug!(client_id = %other, topic = %topic, "No route for client");
                Vec::new()
            }
        }
    }

    fn route_local(&self, topic: &str, payload: &str) -> Vec<Directive> {
        let Some(entry) = self.registry.resolve_local(topic) else {
            debug!(topic = %topic, "Unknown local topic");
            return Vec::new();
        };
        let feed_id = extract_feed_id(topic, entry);

        entry
            .groups
            .iter()
            .filter_map(|group| match handlers::apply(*group, &feed_id, payload) {
                HandlerOutput::Publish { feed_id, payload }
                    if !feed_id.is_empty() && !payload.is_empty() =>
                {
                    Some(Directive::CloudPublish {
                        feed_id,
                        payload,
                        group: group.as_str(),
                    })
                }
                HandlerOutput::Publish { .. } | HandlerOutput::Suppress => None,
                HandlerOutput::Action(action) => Some(Directive::Run(action)),
            })
            .collect()
    }

    fn route_remote(&self, feed_id: &str, payload: &str) -> Vec<Directive> {
        let mut directives = Vec::new();

        if feed_id == FEED_ATTIC_MOTION && payload == "1" {
            directives.push(Directive::Schedule {
                id: JOB_CLEAR_ATTIC_MOTION,
                job: Job::ClearAtticMotion,
                delay: self.clear_attic_delay,
            });
            directives.push(Directive::Schedule {
                id: JOB_VERIFY_ATTIC_MOTION,
                job: Job::FetchAtticMotionValue,
                delay: self.verify_attic_delay,
            });
        }

        let Some(entry) = self.registry.resolve_remote(feed_id) else {
            debug!(feed_id = %feed_id, "Unknown remote feed");
            return directives;
        };
        let payload = if entry.local == TOPIC_WEATHER_CURRENT {
            weather::annotate_forecast(payload)
        } else {
            translate_text(payload, BoolEncoding::Digit, BoolEncoding::Switch)
        };
        directives.push(Directive::LocalPublish {
            topic: entry.local,
            payload: Payload::Text(payload),
        });
        directives
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Command queues the dispatcher produces into. Polling sources are optional.
#[derive(Debug, Clone)]
pub struct Outbound {
    pub local: CommandSender<BrokerCommand>,
    pub cloud: CommandSender<CloudCommand>,
    pub weather: Option<CommandSender<PollCommand>>,
    pub energy: Option<CommandSender<PollCommand>>,
    pub bays: Option<CommandSender<PollCommand>>,
}

pub struct Dispatcher {
    router: Router,
    outbound: Outbound,
    scheduler: Arc<Scheduler>,
    bays: BayState,
    commands: CommandsConfig,
}

impl Dispatcher {
    pub fn new(
        router: Router,
        outbound: Outbound,
        scheduler: Arc<Scheduler>,
        commands: CommandsConfig,
    ) -> Self {
        Self {
            router,
            outbound,
            scheduler,
            bays: BayState::new(),
            commands,
        }
    }

    pub fn bay_state(&self) -> &BayState {
        &self.bays
    }

    /// Handle one event. Never fails: problems are logged.
    pub async fn process(&mut self, event: Event) {
        debug!(event = event.name(), group = %event.group(), "Processing event");
        match event {
            Event::MqttMessage {
                client_id: ClientId::CloudThrottle,
                topic,
                payload,
            } => {
                warn!(topic = %topic, payload = %payload, "Adafruit IO is getting hot");
                tokio::time::sleep(self.commands.throttle_pause()).await;
            }
            Event::MqttMessage {
                client_id,
                topic,
                payload,
            } => {
                for directive in self.router.route(client_id, &topic, &payload) {
                    self.apply(directive).await;
                }
            }
            Event::MqttConnect {
                client_id,
                status,
                reason,
            } => self.on_connection(client_id, status, reason.as_deref()),
            Event::LocalTime { text } => {
                info!(text = %text, "Local time");
                self.outbound.local.publish(TOPIC_LOCAL_TIME, text);
            }
            Event::Weather { payload } => {
                for (topic, value) in weather::weather_topics(&payload) {
                    self.outbound.local.publish(&topic, value);
                }
            }
            Event::EnergyReading { key, value } => {
                self.outbound.local.publish(&key, value);
            }
            Event::ParkingBaysUpdate { payload } => self.on_bays(&payload),
            Event::Scheduled { job } => self.run_job(job),
        }
    }

    async fn apply(&mut self, directive: Directive) {
        match directive {
            Directive::CloudPublish {
                feed_id,
                payload,
                group,
            } => {
                self.outbound.cloud.publish(&feed_id, payload, Some(group));
            }
            Directive::LocalPublish { topic, payload } => {
                self.outbound.local.publish(topic, payload);
            }
            Directive::Schedule { id, job, delay } => {
                if let Err(e) = self.scheduler.add_job(id, job, Trigger::once(delay), true) {
                    error!(job_id = %id, error = %e, "Failed to schedule job");
                }
            }
            Directive::Run(LocalAction::RestartRing) => self.restart_ring().await,
            Directive::Run(LocalAction::FetchTimeAndWeather) => {
                debug!("Explicit request for local time and weather");
                self.outbound.cloud.fetch_local_time();
                if let Some(weather) = &self.outbound.weather {
                    weather.fetch(false);
                }
            }
        }
    }

    fn on_connection(&mut self, client_id: ClientId, status: ConnectionStatus, reason: Option<&str>) {
        info!(client_id = %client_id, status = %status, reason = ?reason, "Connection changed");
        match client_id {
            ClientId::Cloud => {
                let flag = if status.is_connected() { "true" } else { "false" };
                self.outbound.local.publish(TOPIC_CONNECTION, flag);
                if status.is_connected() {
                    self.run_job(Job::AtticCamKeepAlive);
                    self.outbound.cloud.fetch_local_time();
                    if let Some(bays) = &self.outbound.bays {
                        self.bays.clear();
                        bays.fetch(true);
                    }
                }
            }
            ClientId::LocalBroker => {
                for source in [&self.outbound.weather, &self.outbound.energy]
                    .into_iter()
                    .flatten()
                {
                    source.fetch(false);
                }
            }
            _ => {}
        }
    }

    fn on_bays(&mut self, payload: &str) {
        let doc: serde_json::Value = match serde_json::from_str(payload) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "Unable to parse bay status document");
                return;
            }
        };
        let now = Local::now();
        let update = self.bays.process(&doc, now);
        let group = Some(Group::EvBays.as_str());
        let cloud = &self.outbound.cloud;

        cloud.publish("last-update", now.format("%a %I:%M").to_string(), group);
        cloud.publish("last-update-pretty", now.format("%c").to_string(), group);
        for bay in &update.changed {
            let name = bay.feed_name();
            cloud.publish(&format!("{}-status", name), i64::from(bay.code), group);
            cloud.publish(&name, bay.status.as_str(), group);
            cloud.publish(&format!("{}-simpletime", name), bay.simple_time.as_str(), group);
        }
        if !update.changed.is_empty() {
            cloud.publish("bays", update.bays, group);
            cloud.publish("text", "EV Bays", group);
            cloud.publish("available", update.available.to_string(), group);
        }
    }

    fn run_job(&mut self, job: Job) {
        debug!(job = ?job, "Running job");
        let motion = Some(Group::HomeMotion.as_str());
        let cloud = &self.outbound.cloud;
        match job {
            Job::ClearAtticMotion => {
                cloud.publish(FEED_ATTIC_MOTION_SHORT, 0i64, motion);
            }
            Job::AtticCamKeepAlive => {
                cloud.publish(FEED_ATTIC_CAMERA_SHORT, "ka", motion);
            }
            Job::EvBaysClearTimestamps => {
                for bay in 1..=BAY_COUNT {
                    cloud.publish(
                        &format!("bay{}-simpletime", bay),
                        "--",
                        Some(Group::EvBays.as_str()),
                    );
                }
            }
            Job::FetchAtticMotionValue => {
                cloud.fetch_feed(FEED_ATTIC_MOTION, None);
            }
            Job::FetchLocalTime => {
                cloud.fetch_local_time();
            }
        }
    }

    async fn restart_ring(&self) {
        let script = &self.commands.ring_restart_script;
        info!(script = %script.display(), "Restarting ring-mqtt");
        let mut command = tokio::process::Command::new(script);
        command.stdin(Stdio::null()).kill_on_drop(true);
        match tokio::time::timeout(self.commands.ring_restart_timeout(), command.status()).await {
            Ok(Ok(status)) if status.success() => debug!("ring-mqtt restart finished"),
            Ok(Ok(status)) => error!(status = %status, "ring-mqtt restart failed"),
            Ok(Err(e)) => error!(error = %e, "ring-mqtt restart failed"),
            Err(_) => error!(
                timeout = ?self.commands.ring_restart_timeout(),
                "ring-mqtt restart timed out"
            ),
        }
    }
}
