//! Polling workers running under the supervisor.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use adabridge::commands::{command_queue, event_queue, CloudCommand};
use adabridge::config::BaysConfig;
use adabridge::events::{ClientId, Event};
use adabridge::supervisor::{Supervisor, SupervisorError};
use adabridge::workers::poller::{BaysSource, PollSource, PollingWorker};
use adabridge::workers::WorkerError;

use crate::common::{bridge, drain, stations};

/// Always reports one reading.
struct Thermometer;

#[async_trait]
impl PollSource for Thermometer {
    fn client_id(&self) -> ClientId {
        ClientId::Weather
    }

    async fn fetch(&mut self, _force: bool) -> Result<Vec<Event>, WorkerError> {
        Ok(vec![Event::Weather {
            payload: serde_json::json!({"main": {"temp": 55}}),
        }])
    }
}

#[tokio::test]
async fn test_bay_file_update_reaches_cloud_queue() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(stations(&[("Westford 3", "In use")]).as_bytes())
        .unwrap();
    let config = BaysConfig {
        enabled: true,
        file: file.path().to_path_buf(),
        ..BaysConfig::default()
    };

    let mut bridge = bridge();
    let (events, mut events_rx) = event_queue(10);
    let (queue, commands) = command_queue(ClientId::ParkingBays, 10);
    let source = BaysSource::new(&config).unwrap();
    let worker = PollingWorker::new(source, config.interval(), config.interval(), events);

    let mut supervisor = Supervisor::new(Duration::from_secs(1200), Duration::from_secs(1));
    supervisor.spawn(worker, commands, queue.clone());
    assert!(queue.fetch(true));

    let event = tokio::time::timeout(Duration::from_secs(5), events_rx.recv())
        .await
        .expect("bay update before timeout")
        .expect("event queue open");
    assert!(matches!(event, Event::ParkingBaysUpdate { .. }));

    bridge.dispatcher.process(event).await;
    let published: Vec<(String, String)> = drain(&mut bridge.cloud)
        .into_iter()
        .filter_map(|command| match command {
            CloudCommand::Publish {
                feed_id, payload, ..
            } => Some((feed_id, payload.to_string())),
            _ => None,
        })
        .collect();
    assert!(published.contains(&("bay3-status".to_string(), "1".to_string())));
    assert!(published.contains(&("bay3".to_string(), "In use".to_string())));
    assert!(published.contains(&("available".to_string(), "0".to_string())));

    assert_eq!(supervisor.sweep(Instant::now()), Ok(()));
    supervisor.shutdown().await;
}

#[tokio::test]
async fn test_worker_dies_when_event_queue_closes() {
    let (events, events_rx) = event_queue(10);
    drop(events_rx);
    let (queue, commands) = command_queue(ClientId::Weather, 10);
    let worker = PollingWorker::new(
        Thermometer,
        Duration::from_secs(600),
        Duration::from_secs(5),
        events,
    );

    let mut supervisor = Supervisor::new(Duration::from_secs(1200), Duration::from_secs(1));
    supervisor.spawn(worker, commands, queue.clone());
    assert_eq!(supervisor.sweep(Instant::now()), Ok(()));

    assert!(queue.fetch(false));
    let deadline = Instant::now() + Duration::from_secs(5);
    let result = loop {
        let result = supervisor.sweep(Instant::now());
        if result.is_err() || Instant::now() > deadline {
            break result;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    };
    assert_eq!(result, Err(SupervisorError::WorkerDied(ClientId::Weather)));
    supervisor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn test_idle_worker_polls_on_its_interval() {
    let (events, mut events_rx) = event_queue(10);
    let (queue, commands) = command_queue(ClientId::Weather, 10);
    let worker = PollingWorker::new(
        Thermometer,
        Duration::from_secs(600),
        Duration::from_secs(5),
        events,
    );

    let mut supervisor = Supervisor::new(Duration::from_secs(1200), Duration::from_secs(1));
    supervisor.spawn(worker, commands, queue);

    let start = Instant::now();
    let first = events_rx.recv().await.expect("first poll");
    assert!(matches!(first, Event::Weather { .. }));
    assert!(start.elapsed() >= Duration::from_secs(600));

    events_rx.recv().await.expect("second poll");
    assert!(start.elapsed() >= Duration::from_secs(1200));
    supervisor.shutdown().await;
}
