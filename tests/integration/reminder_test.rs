//! Integration tests for reminder delivery guarantees.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use estatehub_database::{InMemoryMeetingStore, MeetingStore};
use estatehub_entity::meeting::MeetingStatus;
use estatehub_entity::reminder::ReminderKind;
use estatehub_worker::dispatch::NotificationDispatcher;
use estatehub_worker::jobs::{ReminderJob, WindowPolicy};
use estatehub_worker::report::FailureKind;
use estatehub_worker::scheduler::HOUR_REMINDER_JOB;
use estatehub_worker::{JobHandler, TickEvent};

use helpers::{RecordingSender, TestScheduler, reminder_config, today, utc, viewing};

fn hour_job(store: Arc<dyn MeetingStore>, sender: Arc<RecordingSender>) -> ReminderJob {
    ReminderJob::new(
        store,
        NotificationDispatcher::new(sender, Duration::from_secs(5), utc()),
        ReminderKind::Hour,
        WindowPolicy::Lookahead {
            duration: ChronoDuration::minutes(60),
        },
    )
}

#[tokio::test]
async fn test_hour_reminder_twice_sends_nothing_new() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let a = store.create(viewing(today(10, 15), 30), today(8, 0));
    let b = store.create(viewing(today(10, 50), 30), today(8, 0));
    let sender = Arc::new(RecordingSender::default());
    let job = hour_job(store.clone(), sender.clone());

    let first = job.run(TickEvent::at(today(10, 0))).await.unwrap();
    assert_eq!(first.entities_processed, 2);
    assert_eq!(sender.sent_for(a.id).len(), 3);
    assert_eq!(sender.sent_for(b.id).len(), 3);

    let second = job.run(TickEvent::at(today(10, 0))).await.unwrap();
    assert_eq!(second.entities_matched, 0);
    assert_eq!(sender.sent().len(), 6);
}

#[tokio::test]
async fn test_window_edges_are_inclusive() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let at_start = store.create(viewing(today(10, 0), 30), today(8, 0));
    let at_end = store.create(viewing(today(11, 0), 30), today(8, 0));
    let past_end = store.create(viewing(today(11, 0) + ChronoDuration::seconds(1), 30), today(8, 0));
    let sender = Arc::new(RecordingSender::default());

    hour_job(store.clone(), sender.clone())
        .run(TickEvent::at(today(10, 0)))
        .await
        .unwrap();

    assert!(store.get(at_start.id).unwrap().hour_reminder_sent);
    assert!(store.get(at_end.id).unwrap().hour_reminder_sent);
    assert!(!store.get(past_end.id).unwrap().hour_reminder_sent);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_instances_send_once() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let meetings: Vec<_> = (0..20)
        .map(|i| store.create(viewing(today(10, 5) + ChronoDuration::minutes(i), 30), today(8, 0)))
        .collect();
    let sender = Arc::new(RecordingSender::default());

    // Four scheduler instances sharing one store tick at the same moment.
    let runs: Vec<_> = (0..4)
        .map(|_| {
            let job = hour_job(store.clone(), sender.clone());
            tokio::spawn(async move { job.run(TickEvent::at(today(10, 0))).await })
        })
        .collect();

    let mut processed = 0;
    for run in runs {
        processed += run.await.unwrap().unwrap().entities_processed;
    }

    assert_eq!(processed, meetings.len());
    for m in &meetings {
        assert_eq!(sender.sent_for(m.id).len(), 3, "meeting {} reminded more than once", m.id);
        assert!(store.get(m.id).unwrap().hour_reminder_sent);
    }
}

#[tokio::test]
async fn test_failed_recipient_does_not_block_others_or_flag() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let data = viewing(today(10, 20), 30);
    let customer = data.customer_email.clone().unwrap();
    let m = store.create(data, today(8, 0));
    let sender = Arc::new(RecordingSender::default());
    sender.reject(&customer);

    let outcome = hour_job(store.clone(), sender.clone())
        .run(TickEvent::at(today(10, 0)))
        .await
        .unwrap();

    assert_eq!(sender.sent_for(m.id).len(), 3);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].kind, FailureKind::Delivery);
    assert!(outcome.failures[0].message.contains(&customer));
    assert!(store.get(m.id).unwrap().hour_reminder_sent);

    // Not retried on the next tick.
    hour_job(store.clone(), sender.clone())
        .run(TickEvent::at(today(10, 10)))
        .await
        .unwrap();
    assert_eq!(sender.sent_for(m.id).len(), 3);
}

#[tokio::test]
async fn test_cancelled_and_completed_meetings_get_no_reminders() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let cancelled = store.create(viewing(today(10, 20), 30), today(8, 0));
    store.update_status(cancelled.id, MeetingStatus::Cancelled).unwrap();
    let completed = store.create(viewing(today(10, 40), 30), today(8, 0));
    store.update_status(completed.id, MeetingStatus::Completed).unwrap();
    let sender = Arc::new(RecordingSender::default());

    let outcome = hour_job(store.clone(), sender.clone())
        .run(TickEvent::at(today(10, 0)))
        .await
        .unwrap();

    assert_eq!(outcome.entities_matched, 0);
    assert!(sender.sent().is_empty());
}

#[tokio::test]
async fn test_rescheduled_meeting_is_reminded_again() {
    let store = Arc::new(InMemoryMeetingStore::new());
    let m = store.create(viewing(today(10, 30), 30), today(8, 0));
    let sender = Arc::new(RecordingSender::default());
    let job = hour_job(store.clone(), sender.clone());

    job.run(TickEvent::at(today(10, 0))).await.unwrap();
    assert_eq!(sender.sent_for(m.id).len(), 3);

    store.reschedule(m.id, today(15, 0)).unwrap();
    assert!(!store.get(m.id).unwrap().hour_reminder_sent);

    job.run(TickEvent::at(today(14, 10))).await.unwrap();
    assert_eq!(sender.sent_for(m.id).len(), 6);
}

#[tokio::test]
async fn test_hour_reminder_through_scheduler() {
    let app = TestScheduler::start(reminder_config(8), today(9, 55)).await;
    let soon = app.store.inner.create(viewing(today(10, 45), 30), today(8, 0));
    let later = app.store.inner.create(viewing(today(11, 15), 30), today(8, 0));

    app.tick(today(10, 0)).await;
    assert!(app.store.inner.get(soon.id).unwrap().hour_reminder_sent);
    assert!(!app.store.inner.get(later.id).unwrap().hour_reminder_sent);

    // The 10:20 tick picks up the later meeting; the first is not resent.
    app.tick(today(10, 10)).await;
    app.tick(today(10, 20)).await;
    assert!(app.store.inner.get(later.id).unwrap().hour_reminder_sent);
    assert_eq!(app.sender.sent_for(soon.id).len(), 3);
    assert_eq!(app.sender.sent_for(later.id).len(), 3);

    let runs = app.observer.for_job(HOUR_REMINDER_JOB);
    assert_eq!(runs.len(), 3);
    assert_eq!(runs.iter().map(|r| r.entities_processed).sum::<usize>(), 2);
}
