//! Scheduler lifecycle: wires a tick source to the job runner.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use estatehub_core::config::{ReminderConfig, SchedulerConfig};
use estatehub_core::error::AppError;
use estatehub_core::result::AppResult;
use estatehub_database::store::MeetingStore;
use estatehub_entity::reminder::ReminderKind;

use crate::clock::TickSource;
use crate::dispatch::NotificationDispatcher;
use crate::jobs::{ReminderJob, StatusUpdateJob, WindowPolicy};
use crate::registry::{JobDefinition, JobRegistry};
use crate::runner::JobRunner;
use crate::schedule::ScheduleSpec;

/// Name of the day-of reminder job.
pub const DAY_REMINDER_JOB: &str = "day_reminder";
/// Name of the pre-meeting reminder job.
pub const HOUR_REMINDER_JOB: &str = "hour_reminder";
/// Name of the meeting auto-complete job.
pub const STATUS_UPDATE_JOB: &str = "meeting_status_update";

/// Drives a [`JobRunner`] from a [`TickSource`] until stopped.
pub struct Scheduler {
    runner: Arc<JobRunner>,
    source: Box<dyn TickSource>,
    config: SchedulerConfig,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("source", &self.source)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

impl Scheduler {
    /// Create a stopped scheduler.
    pub fn new(runner: Arc<JobRunner>, source: Box<dyn TickSource>, config: SchedulerConfig) -> Self {
        Self {
            runner,
            source,
            config,
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// The runner ticks are delivered to.
    pub fn runner(&self) -> &Arc<JobRunner> {
        &self.runner
    }

    /// Whether the tick loop is running.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Start the tick source and the loop feeding ticks to the runner.
    pub async fn start(&mut self) -> AppResult<()> {
        if self.handle.is_some() {
            return Err(AppError::conflict("Scheduler already started"));
        }

        let (tx, mut rx) = mpsc::channel(self.config.tick_buffer.max(1));
        self.source.start(tx).await?;

        let cancel = CancellationToken::new();
        self.cancel = cancel.clone();
        let runner = Arc::clone(&self.runner);

        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    tick = rx.recv() => {
                        let Some(tick) = tick else { break };
                        let report = runner.tick(tick);
                        if !report.is_empty() {
                            tracing::debug!(
                                tick = %tick.logical_time,
                                started = ?report.started,
                                queued = ?report.queued,
                                skipped = ?report.skipped,
                                "Tick processed"
                            );
                        }
                    }
                }
            }
            tracing::debug!("Tick loop exited");
        }));

        tracing::info!(
            jobs = self.runner.registry().len(),
            "Scheduler started"
        );
        Ok(())
    }

    /// Stop accepting ticks, then wait for in-flight jobs.
    ///
    /// No tick is processed once this returns. Returns `true` if every
    /// in-flight job finished within the configured grace period.
    pub async fn stop(&mut self) -> AppResult<bool> {
        let Some(handle) = self.handle.take() else {
            return Ok(true);
        };

        tracing::info!("Stopping scheduler...");
        if let Err(e) = self.source.stop().await {
            tracing::warn!(error = %e, "Tick source did not stop cleanly");
        }

        self.cancel.cancel();
        handle
            .await
            .map_err(|e| AppError::internal(format!("Tick loop failed: {}", e)))?;

        let drained = self.runner.shutdown(self.config.shutdown_grace()).await;
        tracing::info!(drained, "Scheduler stopped");
        Ok(drained)
    }
}

/// Register the meeting reminder and status jobs.
pub fn register_default_jobs(
    registry: &JobRegistry,
    config: &ReminderConfig,
    store: Arc<dyn MeetingStore>,
    dispatcher: NotificationDispatcher,
    now: DateTime<Utc>,
) -> AppResult<()> {
    let offset = config.utc_offset()?;
    let lookahead = chrono::Duration::from_std(config.hour_lookahead())
        .map_err(|e| AppError::configuration(format!("Invalid hour lookahead: {}", e)))?;

    registry.register(
        JobDefinition::new(
            DAY_REMINDER_JOB,
            ScheduleSpec::cron(&config.day_reminder_cron, offset)?,
            Arc::new(ReminderJob::new(
                Arc::clone(&store),
                dispatcher.clone(),
                ReminderKind::Day,
                WindowPolicy::Today { offset },
            )),
        ),
        now,
    )?;

    registry.register(
        JobDefinition::new(
            HOUR_REMINDER_JOB,
            ScheduleSpec::interval(config.hour_interval())?,
            Arc::new(ReminderJob::new(
                Arc::clone(&store),
                dispatcher,
                ReminderKind::Hour,
                WindowPolicy::Lookahead { duration: lookahead },
            )),
        ),
        now,
    )?;

    registry.register(
        JobDefinition::new(
            STATUS_UPDATE_JOB,
            ScheduleSpec::interval(config.status_interval())?,
            Arc::new(StatusUpdateJob::new(store)),
        ),
        now,
    )?;

    tracing::info!("All scheduled jobs registered");
    Ok(())
}
