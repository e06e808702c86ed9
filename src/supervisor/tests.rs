use super::*;
use crate::commands::{command_queue, BrokerCommand, PollCommand};

const MAX_DISCONNECT: Duration = Duration::from_secs(20 * 60);

fn supervisor() -> Supervisor {
    Supervisor::new(MAX_DISCONNECT, Duration::from_secs(1))
}

fn pending_task() -> JoinHandle<Result<(), WorkerError>> {
    tokio::spawn(async {
        std::future::pending::<()>().await;
        Ok(())
    })
}

#[tokio::test]
async fn test_healthy_workers_pass_sweep() {
    let mut supervisor = supervisor();
    let (queue, _rx) = command_queue::<BrokerCommand>(ClientId::LocalBroker, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    assert_eq!(supervisor.client_ids(), vec![ClientId::LocalBroker]);
    assert_eq!(supervisor.sweep(Instant::now()), Ok(()));
}

#[tokio::test]
async fn test_finished_worker_is_reported() {
    let mut supervisor = supervisor();
    let (queue, _rx) = command_queue::<PollCommand>(ClientId::Weather, 10);
    let task = tokio::spawn(async { Err(WorkerError::EventQueueClosed) });
    while !task.is_finished() {
        tokio::task::yield_now().await;
    }
    supervisor.register(WorkerHandle::new(task, Box::new(queue)));

    assert_eq!(
        supervisor.sweep(Instant::now()),
        Err(SupervisorError::WorkerDied(ClientId::Weather))
    );
}

#[tokio::test]
async fn test_full_command_queue_is_reported() {
    let mut supervisor = supervisor();
    let (queue, _rx) = command_queue::<PollCommand>(ClientId::Energy, 1);
    assert!(queue.fetch(false));
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    assert_eq!(
        supervisor.sweep(Instant::now()),
        Err(SupervisorError::CommandQueueFull(ClientId::Energy))
    );
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_limit() {
    let mut supervisor = supervisor();
    let start = Instant::now();
    let (queue, _rx) = command_queue::<BrokerCommand>(ClientId::Cloud, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    supervisor.on_connection(ClientId::Cloud, ConnectionStatus::Connected, start);
    supervisor.on_connection(ClientId::Cloud, ConnectionStatus::Disconnected, start);
    // A repeated disconnect does not reset the clock.
    supervisor.on_connection(
        ClientId::Cloud,
        ConnectionStatus::Disconnected,
        start + Duration::from_secs(600),
    );

    assert_eq!(supervisor.sweep(start + MAX_DISCONNECT), Ok(()));
    assert_eq!(
        supervisor.sweep(start + Duration::from_secs(21 * 60)),
        Err(SupervisorError::DisconnectedTooLong {
            client_id: ClientId::Cloud,
            minutes: 21
        })
    );

    supervisor.on_connection(ClientId::Cloud, ConnectionStatus::Connected, start);
    assert_eq!(supervisor.sweep(start + Duration::from_secs(60 * 60)), Ok(()));
}

#[tokio::test(start_paused = true)]
async fn test_mqtt_worker_that_never_connects_hits_the_limit() {
    let mut supervisor = supervisor();
    let start = Instant::now();
    let (queue, _rx) = command_queue::<BrokerCommand>(ClientId::CloudThrottle, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));
    let (queue, _poll_rx) = command_queue::<PollCommand>(ClientId::Weather, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    assert_eq!(supervisor.sweep(start + Duration::from_secs(5 * 60)), Ok(()));
    assert_eq!(
        supervisor.sweep(start + Duration::from_secs(25 * 60)),
        Err(SupervisorError::DisconnectedTooLong {
            client_id: ClientId::CloudThrottle,
            minutes: 25
        })
    );
}

#[tokio::test(start_paused = true)]
async fn test_polling_workers_have_no_disconnect_limit() {
    let mut supervisor = supervisor();
    let start = Instant::now();
    let (queue, _rx) = command_queue::<PollCommand>(ClientId::Energy, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    assert_eq!(supervisor.sweep(start + Duration::from_secs(24 * 60 * 60)), Ok(()));
}

#[tokio::test]
async fn test_shutdown_signals_workers() {
    let mut supervisor = supervisor();
    let mut signal = supervisor.shutdown_signal();
    let (queue, _rx) = command_queue::<BrokerCommand>(ClientId::LocalBroker, 10);
    let task = tokio::spawn(async move {
        let _ = signal.changed().await;
        Ok(())
    });
    supervisor.register(WorkerHandle::new(task, Box::new(queue)));

    tokio::time::timeout(Duration::from_secs(5), supervisor.shutdown())
        .await
        .unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_aborts_stuck_workers() {
    let mut supervisor = supervisor();
    let (queue, _rx) = command_queue::<BrokerCommand>(ClientId::LocalBroker, 10);
    supervisor.register(WorkerHandle::new(pending_task(), Box::new(queue)));

    supervisor.shutdown().await;
}
