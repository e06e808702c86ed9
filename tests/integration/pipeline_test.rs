//! Event queue → dispatcher → command queue flows.

use std::time::Duration;

use adabridge::commands::CloudCommand;
use adabridge::dispatch::handlers::CMD_GET_LOCAL_TIME_AND_WEATHER;
use adabridge::events::{ClientId, ConnectionStatus, Event};
use adabridge::registry::{FEED_ATTIC_MOTION, TOPIC_CONNECTION, TOPIC_LOCAL_CMD, TOPIC_LOCAL_TIME};
use adabridge::scheduler::{Job, JOB_CLEAR_ATTIC_MOTION, JOB_VERIFY_ATTIC_MOTION};

use crate::common::{bridge, cloud_publish, drain, local_publish, stations, Bridge};

async fn next_event(bridge: &mut Bridge) -> Event {
    tokio::time::timeout(Duration::from_secs(60), bridge.events.recv())
        .await
        .expect("event before timeout")
        .expect("event queue open")
}

#[tokio::test]
async fn test_local_sensor_reading_reaches_cloud_queue() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::message(
            ClientId::LocalBroker,
            "/sensor/temperature_outside",
            "68.4",
        ))
        .await;

    assert_eq!(
        drain(&mut bridge.cloud),
        vec![cloud_publish("outside", "68.4", "home-temperature")]
    );
    assert!(drain(&mut bridge.local).is_empty());
}

#[tokio::test]
async fn test_cloud_feed_reaches_local_queue_as_switch_word() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::message(ClientId::Cloud, FEED_ATTIC_MOTION, "0"))
        .await;

    assert_eq!(
        drain(&mut bridge.local),
        vec![local_publish("/attic/motion", "off")]
    );
    assert!(bridge.scheduler.job_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_attic_motion_clears_itself_and_is_verified() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::message(ClientId::Cloud, FEED_ATTIC_MOTION, "1"))
        .await;

    assert_eq!(
        drain(&mut bridge.local),
        vec![local_publish("/attic/motion", "on")]
    );
    assert_eq!(
        bridge.scheduler.job_ids(),
        vec![JOB_CLEAR_ATTIC_MOTION, JOB_VERIFY_ATTIC_MOTION]
    );

    let clear = next_event(&mut bridge).await;
    assert_eq!(
        clear,
        Event::Scheduled {
            job: Job::ClearAtticMotion
        }
    );
    bridge.dispatcher.process(clear).await;
    assert_eq!(
        drain(&mut bridge.cloud),
        vec![cloud_publish("attic", 0i64, "home-motion")]
    );

    let verify = next_event(&mut bridge).await;
    assert_eq!(
        verify,
        Event::Scheduled {
            job: Job::FetchAtticMotionValue
        }
    );
    bridge.dispatcher.process(verify).await;
    assert_eq!(
        drain(&mut bridge.cloud),
        vec![CloudCommand::FetchFeed {
            feed_id: FEED_ATTIC_MOTION.to_string()
        }]
    );
    assert!(bridge.scheduler.job_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_motion_restarts_the_clear_timer() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::message(ClientId::Cloud, FEED_ATTIC_MOTION, "1"))
        .await;
    tokio::time::sleep(Duration::from_secs(8)).await;
    bridge
        .dispatcher
        .process(Event::message(ClientId::Cloud, FEED_ATTIC_MOTION, "1"))
        .await;

    let start = tokio::time::Instant::now();
    let clear = next_event(&mut bridge).await;
    assert_eq!(
        clear,
        Event::Scheduled {
            job: Job::ClearAtticMotion
        }
    );
    assert!(start.elapsed() >= Duration::from_secs(10));

    let verify = next_event(&mut bridge).await;
    assert_eq!(
        verify,
        Event::Scheduled {
            job: Job::FetchAtticMotionValue
        }
    );
    assert!(bridge.events.try_recv().is_err());
}

#[tokio::test]
async fn test_reconnect_refreshes_everything() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::connect(ClientId::LocalBroker, ConnectionStatus::Connected, None))
        .await;
    assert_eq!(drain(&mut bridge.weather).len(), 1);
    assert_eq!(drain(&mut bridge.energy).len(), 1);

    bridge
        .dispatcher
        .process(Event::ParkingBaysUpdate {
            payload: stations(&[("Westford 1", "Available")]),
        })
        .await;
    assert_eq!(bridge.dispatcher.bay_state().len(), 1);
    drain(&mut bridge.cloud);

    bridge
        .dispatcher
        .process(Event::connect(ClientId::Cloud, ConnectionStatus::Connected, None))
        .await;
    assert_eq!(
        drain(&mut bridge.local),
        vec![local_publish(TOPIC_CONNECTION, "true")]
    );
    assert_eq!(
        drain(&mut bridge.cloud),
        vec![
            cloud_publish("attic-camera", "ka", "home-motion"),
            CloudCommand::FetchLocalTime,
        ]
    );
    assert!(bridge.dispatcher.bay_state().is_empty());
    assert_eq!(drain(&mut bridge.bays).len(), 1);
}

#[tokio::test]
async fn test_local_time_request_fans_out() {
    let mut bridge = bridge();
    bridge
        .dispatcher
        .process(Event::message(
            ClientId::LocalBroker,
            TOPIC_LOCAL_CMD,
            CMD_GET_LOCAL_TIME_AND_WEATHER,
        ))
        .await;

    assert_eq!(drain(&mut bridge.cloud), vec![CloudCommand::FetchLocalTime]);
    assert_eq!(drain(&mut bridge.weather).len(), 1);

    bridge
        .dispatcher
        .process(Event::LocalTime {
            text: "2024-05-01 08:15:00 EDT".to_string(),
        })
        .await;
    assert_eq!(
        drain(&mut bridge.local),
        vec![local_publish(TOPIC_LOCAL_TIME, "2024-05-01 08:15:00 EDT")]
    );
}
