//! Integration tests for the scheduler lifecycle and job runner behaviour.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Duration as ChronoDuration;
use tokio::sync::Semaphore;

use estatehub_entity::meeting::MeetingStatus;
use estatehub_worker::report::{FailureKind, JobOutcome, RunStatus};
use estatehub_worker::scheduler::{DAY_REMINDER_JOB, HOUR_REMINDER_JOB, STATUS_UPDATE_JOB};
use estatehub_worker::{
    JobDefinition, JobExecutionError, JobHandler, JobRegistry, ScheduleSpec, TickEvent,
};
use estatehub_worker::executor::handler_fn;

use helpers::{CollectingObserver, FlakyStore, RecordingSender, TestScheduler, reminder_config, today, viewing};

#[tokio::test]
async fn test_day_reminder_sent_once_per_day() {
    let app = TestScheduler::start(reminder_config(10), today(9, 0)).await;
    let m1 = app.store.inner.create(viewing(today(14, 0), 45), today(8, 0));

    app.tick(today(10, 0)).await;

    let runs = app.observer.for_job(DAY_REMINDER_JOB);
    assert_eq!(runs.len(), 1);
    assert!(runs[0].is_success());
    assert_eq!(runs[0].entities_matched, 1);
    assert!(app.store.inner.get(m1.id).unwrap().day_reminder_sent);
    let sent = app.sender.sent_for(m1.id);
    assert_eq!(sent.len(), 3);
    assert!(sent.iter().all(|s| s.template == "meeting_day_reminder"));

    // Running the daily job again the same day matches nothing.
    let job = app.registry.get(DAY_REMINDER_JOB).unwrap();
    let outcome = job
        .definition()
        .handler
        .run(TickEvent::at(today(10, 5)))
        .await
        .unwrap();
    assert_eq!(outcome.entities_matched, 0);
    assert_eq!(app.sender.sent_for(m1.id).len(), 3);
}

#[tokio::test]
async fn test_jobs_fire_only_on_their_boundaries() {
    let app = TestScheduler::start(reminder_config(8), today(9, 1)).await;

    // 09:05: not a ten-minute boundary, no daily run; status runs every minute.
    app.tick(today(9, 5)).await;
    assert!(app.observer.for_job(HOUR_REMINDER_JOB).is_empty());
    assert!(app.observer.for_job(DAY_REMINDER_JOB).is_empty());
    assert_eq!(app.observer.for_job(STATUS_UPDATE_JOB).len(), 1);

    app.tick(today(9, 10)).await;
    assert_eq!(app.observer.for_job(HOUR_REMINDER_JOB).len(), 1);
    assert!(app.observer.for_job(DAY_REMINDER_JOB).is_empty());
}

#[tokio::test]
async fn test_status_job_completes_after_end() {
    let app = TestScheduler::start(reminder_config(8), today(8, 30)).await;
    let m = app.store.inner.create(viewing(today(9, 0), 30), today(8, 0));

    app.tick(today(9, 29)).await;
    assert_eq!(app.store.inner.get(m.id).unwrap().status, MeetingStatus::Pending);

    app.tick(today(9, 31)).await;
    assert_eq!(app.store.inner.get(m.id).unwrap().status, MeetingStatus::Completed);

    let last = app.observer.for_job(STATUS_UPDATE_JOB).pop().unwrap();
    assert_eq!(last.entities_processed, 1);
}

#[tokio::test]
async fn test_query_failure_is_retried_next_tick() {
    let app = TestScheduler::start(reminder_config(8), today(9, 55)).await;
    let m = app.store.inner.create(viewing(today(10, 30), 30), today(8, 0));

    app.store.set_down(true);
    app.tick(today(10, 0)).await;

    let runs = app.observer.for_job(HOUR_REMINDER_JOB);
    assert_eq!(runs.len(), 1);
    assert!(matches!(runs[0].status, RunStatus::Failed { kind: FailureKind::Query, .. }));
    assert!(!app.store.inner.get(m.id).unwrap().hour_reminder_sent);
    assert!(app.sender.sent().is_empty());

    app.store.set_down(false);
    app.tick(today(10, 10)).await;

    let runs = app.observer.for_job(HOUR_REMINDER_JOB);
    assert!(runs[1].is_success());
    assert!(app.store.inner.get(m.id).unwrap().hour_reminder_sent);
    assert_eq!(app.sender.sent_for(m.id).len(), 3);
}

#[tokio::test]
async fn test_slow_job_is_not_overlapped() {
    let registry = Arc::new(JobRegistry::new());
    let calls = Arc::new(AtomicUsize::new(0));
    let gate = Arc::new(Semaphore::new(0));

    let handler = {
        let calls = Arc::clone(&calls);
        let gate = Arc::clone(&gate);
        handler_fn("slow", move |_tick| {
            let calls = Arc::clone(&calls);
            let gate = Arc::clone(&gate);
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                gate.acquire().await.map(|p| p.forget()).ok();
                Ok(JobOutcome::default())
            }
        })
    };
    registry
        .register(JobDefinition::new("slow", ScheduleSpec::every_minutes(1).unwrap(), handler), today(9, 0))
        .unwrap();

    let app = TestScheduler::with_registry(
        Arc::new(FlakyStore::default()),
        Arc::new(RecordingSender::default()),
        Arc::new(CollectingObserver::default()),
        registry,
    )
    .await;

    app.tick_nowait(today(9, 1)).await;
    app.tick_nowait(today(9, 2)).await;
    app.tick_nowait(today(9, 3)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    gate.add_permits(1);
    app.runner.drain().await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(app.observer.results().len(), 1);
}

#[tokio::test]
async fn test_panicking_and_hanging_jobs_do_not_stop_others() {
    let registry = Arc::new(JobRegistry::new());
    let healthy = Arc::new(AtomicUsize::new(0));

    registry
        .register(
            JobDefinition::new(
                "panics",
                ScheduleSpec::every_minutes(1).unwrap(),
                handler_fn("panics", |tick| async move {
                    if tick.logical_time.timestamp() > 0 {
                        panic!("unexpected state");
                    }
                    Ok(JobOutcome::default())
                }),
            ),
            today(9, 0),
        )
        .unwrap();
    registry
        .register(
            JobDefinition::new(
                "hangs",
                ScheduleSpec::every_minutes(1).unwrap(),
                handler_fn("hangs", |_tick| async {
                    std::future::pending::<()>().await;
                    Ok(JobOutcome::default())
                }),
            )
            .with_timeout(Duration::from_millis(50)),
            today(9, 0),
        )
        .unwrap();
    let counted = Arc::clone(&healthy);
    registry
        .register(
            JobDefinition::new(
                "healthy",
                ScheduleSpec::every_minutes(1).unwrap(),
                handler_fn("healthy", move |_tick| {
                    let counted = Arc::clone(&counted);
                    async move {
                        counted.fetch_add(1, Ordering::SeqCst);
                        Ok::<_, JobExecutionError>(JobOutcome::default())
                    }
                }),
            ),
            today(9, 0),
        )
        .unwrap();

    let app = TestScheduler::with_registry(
        Arc::new(FlakyStore::default()),
        Arc::new(RecordingSender::default()),
        Arc::new(CollectingObserver::default()),
        registry,
    )
    .await;

    app.tick(today(9, 1)).await;
    app.tick(today(9, 2)).await;

    assert_eq!(healthy.load(Ordering::SeqCst), 2);
    let panics = app.observer.for_job("panics");
    assert_eq!(panics.len(), 2);
    assert!(matches!(panics[0].status, RunStatus::Failed { kind: FailureKind::Panic, .. }));
    let hangs = app.observer.for_job("hangs");
    assert_eq!(hangs.len(), 2);
    assert!(matches!(hangs[1].status, RunStatus::Failed { kind: FailureKind::Timeout, .. }));
}

#[tokio::test]
async fn test_no_tick_after_stop() {
    let mut app = TestScheduler::start(reminder_config(8), today(9, 0)).await;
    let m = app.store.inner.create(viewing(today(9, 30), 30), today(8, 0));

    assert!(app.scheduler.stop().await.unwrap());
    assert!(!app.clock.tick(today(9, 10)).await);
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }

    assert!(app.observer.results().is_empty());
    assert!(!app.store.inner.get(m.id).unwrap().hour_reminder_sent);
}

#[tokio::test]
async fn test_restart_after_sleep_does_not_replay_missed_runs() {
    let app = TestScheduler::start(reminder_config(8), today(9, 0)).await;

    // The process was suspended from 09:00 to 09:47.
    app.tick(today(9, 47)).await;
    assert_eq!(app.observer.for_job(HOUR_REMINDER_JOB).len(), 1);

    app.tick(today(9, 48)).await;
    assert_eq!(app.observer.for_job(HOUR_REMINDER_JOB).len(), 1);
    assert_eq!(
        app.registry.get(HOUR_REMINDER_JOB).unwrap().next_fire(),
        today(9, 47) + ChronoDuration::minutes(3)
    );
}
