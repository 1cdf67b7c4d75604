//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, FixedOffset, TimeZone, Utc};
use uuid::Uuid;

use estatehub_core::config::{DatabaseConfig, ReminderConfig, SchedulerConfig};
use estatehub_core::error::AppError;
use estatehub_core::result::AppResult;
use estatehub_database::{DatabasePool, DueQuery, InMemoryMeetingStore, MeetingRepository, MeetingStore};
use estatehub_entity::meeting::{CreateMeeting, Meeting};
use estatehub_entity::recipient::Recipient;
use estatehub_entity::reminder::ReminderKind;
use estatehub_worker::dispatch::{
    DeliveryError, DeliveryReceipt, MessagePayload, NotificationDispatcher, NotificationSender,
};
use estatehub_worker::{
    JobExecutor, JobRegistry, JobRunResult, JobRunner, ManualTickSource, RunObserver, Scheduler,
    register_default_jobs,
};

/// One recorded delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sent {
    pub meeting_id: Uuid,
    pub template: String,
    pub email: String,
}

/// Sender that records every message and can be told to reject addresses.
#[derive(Debug, Default)]
pub struct RecordingSender {
    sent: Mutex<Vec<Sent>>,
    rejected: Mutex<Vec<String>>,
}

impl RecordingSender {
    pub fn reject(&self, email: &str) {
        self.rejected.lock().unwrap().push(email.to_string());
    }

    pub fn sent(&self) -> Vec<Sent> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_for(&self, meeting_id: Uuid) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| s.meeting_id == meeting_id)
            .collect()
    }
}

#[async_trait]
impl NotificationSender for RecordingSender {
    async fn send(
        &self,
        recipient: &Recipient,
        payload: &MessagePayload,
    ) -> Result<DeliveryReceipt, DeliveryError> {
        let meeting_id = payload.data["meeting_id"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        self.sent.lock().unwrap().push(Sent {
            meeting_id,
            template: payload.template.clone(),
            email: recipient.email.clone(),
        });

        if self.rejected.lock().unwrap().contains(&recipient.email) {
            return Err(DeliveryError::Permanent("recipient rejected".to_string()));
        }
        Ok(DeliveryReceipt {
            provider_id: Some(Uuid::new_v4().to_string()),
        })
    }
}

/// Observer that keeps every run result.
#[derive(Debug, Default)]
pub struct CollectingObserver {
    results: Mutex<Vec<JobRunResult>>,
}

impl CollectingObserver {
    pub fn results(&self) -> Vec<JobRunResult> {
        self.results.lock().unwrap().clone()
    }

    pub fn for_job(&self, name: &str) -> Vec<JobRunResult> {
        self.results()
            .into_iter()
            .filter(|r| r.job_name == name)
            .collect()
    }
}

impl RunObserver for CollectingObserver {
    fn record(&self, result: &JobRunResult) {
        self.results.lock().unwrap().push(result.clone());
    }
}

/// In-memory store that can be switched into failing every call.
#[derive(Debug, Default)]
pub struct FlakyStore {
    pub inner: InMemoryMeetingStore,
    down: AtomicBool,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> AppResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(AppError::database("database unreachable"));
        }
        Ok(())
    }
}

#[async_trait]
impl MeetingStore for FlakyStore {
    async fn find_due(&self, query: &DueQuery) -> AppResult<Vec<Meeting>> {
        self.check()?;
        self.inner.find_due(query).await
    }

    async fn conditional_mark_sent(&self, meeting_id: Uuid, kind: ReminderKind) -> AppResult<bool> {
        self.check()?;
        self.inner.conditional_mark_sent(meeting_id, kind).await
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>> {
        self.check()?;
        self.inner.find_overdue(now).await
    }

    async fn complete_if_active(&self, meeting_id: Uuid) -> AppResult<bool> {
        self.check()?;
        self.inner.complete_if_active(meeting_id).await
    }
}

/// Test harness: default jobs on an in-memory store, driven by a manual clock.
pub struct TestScheduler {
    pub store: Arc<FlakyStore>,
    pub sender: Arc<RecordingSender>,
    pub observer: Arc<CollectingObserver>,
    pub registry: Arc<JobRegistry>,
    pub runner: Arc<JobRunner>,
    pub clock: ManualTickSource,
    pub scheduler: Scheduler,
}

impl TestScheduler {
    /// Register the default jobs at `now` and start the scheduler.
    pub async fn start(config: ReminderConfig, now: DateTime<Utc>) -> Self {
        let store = Arc::new(FlakyStore::default());
        let sender = Arc::new(RecordingSender::default());
        let observer = Arc::new(CollectingObserver::default());
        let registry = Arc::new(JobRegistry::new());

        let dispatcher = NotificationDispatcher::new(
            sender.clone(),
            Duration::from_secs(5),
            config.utc_offset().expect("valid offset"),
        );
        register_default_jobs(&registry, &config, store.clone(), dispatcher, now)
            .expect("Failed to register default jobs");

        Self::with_registry(store, sender, observer, registry).await
    }

    /// Start a scheduler over an already populated registry.
    pub async fn with_registry(
        store: Arc<FlakyStore>,
        sender: Arc<RecordingSender>,
        observer: Arc<CollectingObserver>,
        registry: Arc<JobRegistry>,
    ) -> Self {
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&registry),
            Arc::new(JobExecutor::new(Duration::from_secs(30))),
            observer.clone(),
        ));
        let clock = ManualTickSource::new();
        let mut scheduler = Scheduler::new(
            Arc::clone(&runner),
            Box::new(clock.clone()),
            SchedulerConfig::default(),
        );
        scheduler.start().await.expect("Failed to start scheduler");

        Self {
            store,
            sender,
            observer,
            registry,
            runner,
            clock,
            scheduler,
        }
    }

    /// Deliver a tick and wait for the runs it started.
    pub async fn tick(&self, at: DateTime<Utc>) {
        assert!(self.clock.tick(at).await, "scheduler is not running");
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
        self.runner.drain().await;
    }

    /// Deliver a tick without waiting for the runs to finish.
    pub async fn tick_nowait(&self, at: DateTime<Utc>) {
        assert!(self.clock.tick(at).await, "scheduler is not running");
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }
}

/// PostgreSQL-backed repository for the store tests.
pub struct TestDatabase {
    pub db: DatabasePool,
    pub repo: Arc<MeetingRepository>,
    base: DateTime<Utc>,
}

impl TestDatabase {
    /// Connect and migrate, or `None` when no test database is configured.
    ///
    /// Reads `ESTATEHUB_TEST_DATABASE_URL`, falling back to `DATABASE_URL`.
    pub async fn connect() -> Option<Self> {
        let url = std::env::var("ESTATEHUB_TEST_DATABASE_URL")
            .or_else(|_| std::env::var("DATABASE_URL"))
            .ok()?;
        let config = DatabaseConfig {
            url,
            max_connections: 8,
            min_connections: 1,
            connect_timeout_seconds: 10,
            idle_timeout_seconds: 60,
            run_migrations: true,
        };
        let db = DatabasePool::open(&config)
            .await
            .expect("Failed to connect to test database");
        let repo = Arc::new(MeetingRepository::new(db.pool().clone()));

        // A random day per harness keeps concurrent tests and earlier runs out of each other's windows.
        let day = (Uuid::new_v4().as_u128() % 100_000) as i64;
        let base = Utc.with_ymd_and_hms(2100, 1, 1, 9, 0, 0).unwrap() + ChronoDuration::days(day);

        Some(Self { db, repo, base })
    }

    /// `h:m` on this harness's private day.
    pub fn at(&self, h: u32, m: u32) -> DateTime<Utc> {
        self.base + ChronoDuration::hours(i64::from(h) - 9) + ChronoDuration::minutes(i64::from(m))
    }
}

/// Reminder config evaluated in UTC with the day reminder at `hour`:00.
pub fn reminder_config(day_reminder_hour: u32) -> ReminderConfig {
    ReminderConfig {
        day_reminder_cron: format!("0 0 {} * * *", day_reminder_hour),
        ..ReminderConfig::default()
    }
}

pub fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// A fixed test date at `h:m` UTC.
pub fn today(h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 9, 14, h, m, 0).unwrap()
}

/// A meeting with an agency, agent and customer address.
pub fn viewing(scheduled_at: DateTime<Utc>, duration_minutes: i32) -> CreateMeeting {
    let tag = Uuid::new_v4().simple().to_string();
    CreateMeeting {
        agency_id: Uuid::new_v4(),
        title: "Apartment viewing".to_string(),
        property_address: Some("Flat 3, 88 Mill Lane".to_string()),
        agency_name: "Millbrook Lettings".to_string(),
        agency_email: Some(format!("office+{}@millbrook.test", &tag[..8])),
        agent_name: "Alex Kim".to_string(),
        agent_email: Some(format!("alex+{}@millbrook.test", &tag[..8])),
        customer_name: "Noor Haddad".to_string(),
        customer_email: Some(format!("noor+{}@example.test", &tag[..8])),
        scheduled_at,
        duration_minutes,
    }
}
