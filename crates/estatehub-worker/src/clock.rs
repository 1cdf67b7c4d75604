//! Tick sources that wake the job runner up.
//!
//! A tick source only decides *when* the runner looks at the registry.
//! Whether a given job is due is decided by that job's own schedule.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use estatehub_core::error::AppError;
use estatehub_core::result::AppResult;

/// One scheduler wake-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickEvent {
    /// The time due checks are evaluated against.
    pub logical_time: DateTime<Utc>,
}

impl TickEvent {
    /// Tick at an explicit instant.
    pub fn at(logical_time: DateTime<Utc>) -> Self {
        Self { logical_time }
    }

    /// Tick at the current wall-clock second.
    pub fn now() -> Self {
        Self::at(Utc::now().trunc_subsecs(0))
    }
}

/// Emits [`TickEvent`]s into a channel until stopped.
#[async_trait]
pub trait TickSource: Send + Sync + std::fmt::Debug {
    /// Begin delivering ticks into `ticks`.
    async fn start(&mut self, ticks: mpsc::Sender<TickEvent>) -> AppResult<()>;

    /// Stop delivering ticks. No tick is delivered after this returns.
    async fn stop(&mut self) -> AppResult<()>;
}

/// Wall-clock heartbeat driven by `tokio-cron-scheduler`.
///
/// Fires on every match of `expression` (default: every second). Wake-ups
/// missed while the process was suspended are not replayed.
pub struct CronTickSource {
    expression: String,
    scheduler: Option<JobScheduler>,
}

impl std::fmt::Debug for CronTickSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronTickSource")
            .field("expression", &self.expression)
            .field("running", &self.scheduler.is_some())
            .finish()
    }
}

impl CronTickSource {
    /// Create a heartbeat for the given six-field cron expression.
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            scheduler: None,
        }
    }
}

#[async_trait]
impl TickSource for CronTickSource {
    async fn start(&mut self, ticks: mpsc::Sender<TickEvent>) -> AppResult<()> {
        if self.scheduler.is_some() {
            return Err(AppError::conflict("Tick source already started"));
        }

        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create tick scheduler: {}", e)))?;

        let heartbeat = CronJob::new_async(self.expression.as_str(), move |_uuid, _lock| {
            let ticks = ticks.clone();
            Box::pin(async move {
                let tick = TickEvent::now();
                match ticks.try_send(tick) {
                    Ok(()) => tracing::trace!(at = %tick.logical_time, "Tick"),
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            at = %tick.logical_time,
                            "Runner is behind, dropping tick"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        tracing::debug!("Tick channel closed");
                    }
                }
            })
        })
        .map_err(|e| {
            AppError::configuration(format!(
                "Invalid tick expression '{}': {}",
                self.expression, e
            ))
        })?;

        scheduler
            .add(heartbeat)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add heartbeat: {}", e)))?;

        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start tick scheduler: {}", e)))?;

        tracing::info!(expression = %self.expression, "Cron tick source started");
        self.scheduler = Some(scheduler);
        Ok(())
    }

    async fn stop(&mut self) -> AppResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Ok(());
        };

        scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shut down tick scheduler: {}", e)))?;

        tracing::info!("Cron tick source stopped");
        Ok(())
    }
}

/// Tick source driven by explicit calls, for tests and embedding.
///
/// Clones share the same channel, so a test can keep one handle and give
/// another to the scheduler.
#[derive(Debug, Clone, Default)]
pub struct ManualTickSource {
    sender: Arc<Mutex<Option<mpsc::Sender<TickEvent>>>>,
}

impl ManualTickSource {
    /// Create a detached manual source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver a tick at `at`. Returns `false` if the source is not running.
    pub async fn tick(&self, at: DateTime<Utc>) -> bool {
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        match sender {
            Some(sender) => sender.send(TickEvent::at(at)).await.is_ok(),
            None => false,
        }
    }

    fn replace(&self, sender: Option<mpsc::Sender<TickEvent>>) {
        match self.sender.lock() {
            Ok(mut guard) => *guard = sender,
            Err(poisoned) => *poisoned.into_inner() = sender,
        }
    }
}

#[async_trait]
impl TickSource for ManualTickSource {
    async fn start(&mut self, ticks: mpsc::Sender<TickEvent>) -> AppResult<()> {
        self.replace(Some(ticks));
        Ok(())
    }

    async fn stop(&mut self) -> AppResult<()> {
        self.replace(None);
        Ok(())
    }
}
