//! Named job definitions and their per-job runtime state.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use estatehub_core::error::AppError;

use crate::clock::TickEvent;
use crate::executor::JobHandler;
use crate::schedule::ScheduleSpec;

/// What to do when a job is due while a previous invocation is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConcurrencyPolicy {
    /// Drop the new tick.
    SkipIfRunning,
    /// Run once more after the current invocation, keeping at most one pending tick.
    Queue,
    /// Start another invocation alongside the running one.
    RunParallel,
}

/// Error raised while registering jobs.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// A job with this name is already registered.
    #[error("Job '{0}' is already registered")]
    DuplicateJob(String),
}

impl From<RegistryError> for AppError {
    fn from(err: RegistryError) -> Self {
        AppError::conflict(err.to_string())
    }
}

/// A named, scheduled unit of work.
#[derive(Debug, Clone)]
pub struct JobDefinition {
    /// Unique name.
    pub name: String,
    /// When the job fires.
    pub schedule: ScheduleSpec,
    /// What runs.
    pub handler: Arc<dyn JobHandler>,
    /// Overlap behaviour.
    pub policy: ConcurrencyPolicy,
    /// Per-invocation timeout; the runner default applies when unset.
    pub timeout: Option<Duration>,
}

impl JobDefinition {
    /// New definition with the `SkipIfRunning` policy and default timeout.
    pub fn new(
        name: impl Into<String>,
        schedule: ScheduleSpec,
        handler: Arc<dyn JobHandler>,
    ) -> Self {
        Self {
            name: name.into(),
            schedule,
            handler,
            policy: ConcurrencyPolicy::SkipIfRunning,
            timeout: None,
        }
    }

    /// Set the concurrency policy.
    pub fn with_policy(mut self, policy: ConcurrencyPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Set a per-invocation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of asking a job to start for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Start an invocation now.
    Start,
    /// Deferred until the running invocation finishes.
    Queued,
    /// Dropped: already running under `SkipIfRunning`, or a tick is already queued.
    Skipped,
}

#[derive(Debug)]
struct JobState {
    next_fire: DateTime<Utc>,
    last_fire: Option<DateTime<Utc>>,
    in_flight: usize,
    queued: Option<TickEvent>,
}

/// A definition plus its runtime bookkeeping.
#[derive(Debug)]
pub struct RegisteredJob {
    definition: JobDefinition,
    state: Mutex<JobState>,
}

impl RegisteredJob {
    fn new(definition: JobDefinition, now: DateTime<Utc>) -> Self {
        let next_fire = definition.schedule.next_after(now);
        Self {
            definition,
            state: Mutex::new(JobState {
                next_fire,
                last_fire: None,
                in_flight: 0,
                queued: None,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, JobState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The job's definition.
    pub fn definition(&self) -> &JobDefinition {
        &self.definition
    }

    /// The job's name.
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    /// Next boundary the job fires at.
    pub fn next_fire(&self) -> DateTime<Utc> {
        self.state().next_fire
    }

    /// Logical time of the last tick that started an invocation.
    pub fn last_fire(&self) -> Option<DateTime<Utc>> {
        self.state().last_fire
    }

    /// Whether an invocation is in progress.
    pub fn is_running(&self) -> bool {
        self.state().in_flight > 0
    }

    fn is_scheduled_at(&self, now: DateTime<Utc>) -> bool {
        self.state().next_fire <= now
    }

    fn is_due(&self, now: DateTime<Utc>) -> bool {
        let state = self.state();
        state.next_fire <= now
            && !(self.definition.policy == ConcurrencyPolicy::SkipIfRunning && state.in_flight > 0)
    }

    /// Move the next fire time past `now` if the job was scheduled at or
    /// before it. Returns whether the job was scheduled.
    fn advance(&self, now: DateTime<Utc>) -> bool {
        let mut state = self.state();
        if state.next_fire > now {
            return false;
        }
        state.next_fire = self.definition.schedule.next_after(now);
        true
    }

    /// Apply the concurrency policy for `tick`.
    pub(crate) fn admit(&self, tick: TickEvent) -> Admission {
        let mut state = self.state();
        let admission = match (self.definition.policy, state.in_flight) {
            (_, 0) | (ConcurrencyPolicy::RunParallel, _) => Admission::Start,
            (ConcurrencyPolicy::SkipIfRunning, _) => Admission::Skipped,
            (ConcurrencyPolicy::Queue, _) if state.queued.is_none() => {
                state.queued = Some(tick);
                Admission::Queued
            }
            (ConcurrencyPolicy::Queue, _) => Admission::Skipped,
        };
        if admission == Admission::Start {
            state.in_flight += 1;
            state.last_fire = Some(tick.logical_time);
        }
        admission
    }

    /// Called when an invocation ends. Hands back the queued tick, if any,
    /// keeping the invocation slot occupied so it runs next.
    pub(crate) fn finish(&self) -> Option<TickEvent> {
        let mut state = self.state();
        match state.queued.take() {
            Some(tick) => {
                state.last_fire = Some(tick.logical_time);
                Some(tick)
            }
            None => {
                state.in_flight = state.in_flight.saturating_sub(1);
                None
            }
        }
    }
}

/// Holds registered jobs in registration order.
#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<Vec<Arc<RegisteredJob>>>,
}

impl JobRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Arc<RegisteredJob>>> {
        self.jobs.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Arc<RegisteredJob>>> {
        self.jobs.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a job; its first fire is the first boundary after `now`.
    pub fn register(&self, definition: JobDefinition, now: DateTime<Utc>) -> Result<(), RegistryError> {
        let mut jobs = self.write();
        if jobs.iter().any(|job| job.name() == definition.name) {
            return Err(RegistryError::DuplicateJob(definition.name));
        }

        let job = RegisteredJob::new(definition, now);
        tracing::info!(
            job = %job.name(),
            schedule = %job.definition().schedule,
            policy = ?job.definition().policy,
            next_fire = %job.next_fire(),
            "Registered job"
        );
        jobs.push(Arc::new(job));
        Ok(())
    }

    /// Remove a job by name. Returns whether it was present.
    ///
    /// An invocation already running is left to finish.
    pub fn unregister(&self, name: &str) -> bool {
        let mut jobs = self.write();
        let before = jobs.len();
        jobs.retain(|job| job.name() != name);
        let removed = jobs.len() != before;
        if removed {
            tracing::info!(job = %name, "Unregistered job");
        }
        removed
    }

    /// Jobs due at `now`, in registration order, leaving out
    /// `SkipIfRunning` jobs that are still running.
    pub fn list_due(&self, now: DateTime<Utc>) -> Vec<Arc<RegisteredJob>> {
        self.read()
            .iter()
            .filter(|job| job.is_due(now))
            .cloned()
            .collect()
    }

    /// Jobs whose fire time has been reached at `now`, running or not.
    pub fn list_scheduled(&self, now: DateTime<Utc>) -> Vec<Arc<RegisteredJob>> {
        self.read()
            .iter()
            .filter(|job| job.is_scheduled_at(now))
            .cloned()
            .collect()
    }

    /// Move every job scheduled at or before `now` to its next boundary
    /// after `now`. Boundaries missed in between are not replayed.
    pub fn advance(&self, now: DateTime<Utc>) -> usize {
        self.read().iter().filter(|job| job.advance(now)).count()
    }

    /// Look up a job by name.
    pub fn get(&self, name: &str) -> Option<Arc<RegisteredJob>> {
        self.read().iter().find(|job| job.name() == name).cloned()
    }

    /// Registered names in registration order.
    pub fn job_names(&self) -> Vec<String> {
        self.read().iter().map(|job| job.name().to_string()).collect()
    }

    /// Number of registered jobs.
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether no jobs are registered.
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
