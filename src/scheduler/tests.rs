use super::*;
use crate::commands::event_queue;

#[test]
fn test_cron_trigger_parses() {
    assert!(matches!(
        Trigger::cron("45 23 13 * * Wed,Sun"),
        Ok(Trigger::Cron(_))
    ));
    assert!(Trigger::cron("23 23 23 * * *").is_ok());
}

#[test]
fn test_invalid_cron_rejected() {
    let err = Trigger::cron("every tuesday").unwrap_err();
    assert!(matches!(err, SchedulerError::InvalidCron { .. }));
}

#[tokio::test(start_paused = true)]
async fn test_once_job_fires_and_removes_itself() {
    let (sink, mut rx) = event_queue(10);
    let scheduler = Scheduler::new(sink);

    scheduler
        .add_job(
            JOB_CLEAR_ATTIC_MOTION,
            Job::ClearAtticMotion,
            Trigger::once(Duration::from_secs(10)),
            true,
        )
        .unwrap();
    assert_eq!(scheduler.job_ids(), vec![JOB_CLEAR_ATTIC_MOTION.to_string()]);

    let event = rx.recv().await.unwrap();
    assert_eq!(
        event,
        Event::Scheduled {
            job: Job::ClearAtticMotion
        }
    );
    assert!(scheduler.job_ids().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_replace_existing_keeps_single_job() {
    let (sink, mut rx) = event_queue(10);
    let scheduler = Scheduler::new(sink);

    for _ in 0..3 {
        scheduler
            .add_job(
                JOB_VERIFY_ATTIC_MOTION,
                Job::FetchAtticMotionValue,
                Trigger::once(Duration::from_secs(15)),
                true,
            )
            .unwrap();
    }
    assert_eq!(scheduler.job_ids().len(), 1);

    tokio::time::sleep(Duration::from_secs(16)).await;
    assert!(rx.try_recv().is_ok());
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_without_replace_rejected() {
    let (sink, _rx) = event_queue(10);
    let scheduler = Scheduler::new(sink);
    let trigger = Trigger::once(Duration::from_secs(60));

    scheduler
        .add_job("job", Job::FetchLocalTime, trigger.clone(), false)
        .unwrap();
    let err = scheduler
        .add_job("job", Job::FetchLocalTime, trigger, false)
        .unwrap_err();
    assert!(matches!(err, SchedulerError::DuplicateJob(id) if id == "job"));
}

#[tokio::test(start_paused = true)]
async fn test_interval_job_first_run_delayed() {
    let (sink, mut rx) = event_queue(10);
    let scheduler = Scheduler::new(sink);

    scheduler
        .add_job(
            JOB_PERIODIC_FETCH_LOCAL_TIME,
            Job::FetchLocalTime,
            Trigger::interval(Duration::from_secs(55 * 60), Duration::from_secs(30 * 60)),
            true,
        )
        .unwrap();

    tokio::time::sleep(Duration::from_secs(29 * 60)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_secs(2 * 60)).await;
    assert_eq!(
        rx.try_recv().unwrap(),
        Event::Scheduled {
            job: Job::FetchLocalTime
        }
    );

    tokio::time::sleep(Duration::from_secs(55 * 60)).await;
    assert!(rx.try_recv().is_ok());
    assert_eq!(scheduler.job_ids().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_remove_and_shutdown() {
    let (sink, mut rx) = event_queue(10);
    let scheduler = Scheduler::new(sink);
    let trigger = Trigger::once(Duration::from_secs(5));

    scheduler.add_job("a", Job::FetchLocalTime, trigger.clone(), false).unwrap();
    scheduler.add_job("b", Job::FetchLocalTime, trigger, false).unwrap();

    assert!(scheduler.remove_job("a"));
    assert!(!scheduler.remove_job("a"));
    scheduler.shutdown();
    assert!(scheduler.job_ids().is_empty());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_interval_job_stops_when_event_queue_is_full() {
    let (sink, mut rx) = event_queue(1);
    let scheduler = Scheduler::new(sink);

    scheduler
        .add_job(
            JOB_PERIODIC_FETCH_ATTIC_MOTION,
            Job::FetchAtticMotionValue,
            Trigger::interval(Duration::from_secs(60), Duration::from_secs(60)),
            true,
        )
        .unwrap();
    assert!(scheduler.check().is_ok());

    // First firing fills the queue, the second cannot be queued.
    tokio::time::sleep(Duration::from_secs(121)).await;
    assert!(scheduler.job_ids().is_empty());
    assert!(matches!(
        scheduler.check(),
        Err(SchedulerError::JobStopped { id, reason: QueueError::Full(_) })
            if id == JOB_PERIODIC_FETCH_ATTIC_MOTION
    ));

    assert!(rx.try_recv().is_ok());
    tokio::time::sleep(Duration::from_secs(120)).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_once_job_reports_closed_queue() {
    let (sink, rx) = event_queue(10);
    drop(rx);
    let scheduler = Scheduler::new(sink);

    scheduler
        .add_job("later", Job::FetchLocalTime, Trigger::once(Duration::from_secs(5)), true)
        .unwrap();
    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(matches!(
        scheduler.check(),
        Err(SchedulerError::JobStopped { reason: QueueError::Closed, .. })
    ));
}
