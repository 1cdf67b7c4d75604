//! Per-run result records and the observer they are reported to.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::TickEvent;
use crate::executor::JobExecutionError;

/// Category of a failure inside or around a job run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The handler exceeded its time budget.
    Timeout,
    /// The meeting store could not be queried or updated.
    Query,
    /// A notification could not be delivered to a recipient.
    Delivery,
    /// The handler panicked.
    Panic,
    /// Anything else.
    Internal,
}

/// A failure tied to one entity processed by a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityFailure {
    /// The entity being processed.
    pub entity_id: Uuid,
    /// Failure category.
    pub kind: FailureKind,
    /// Human-readable detail.
    pub message: String,
}

/// What a handler reports back after a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    /// Entities the handler's query returned.
    pub entities_matched: usize,
    /// Entities the handler acted on.
    pub entities_processed: usize,
    /// Per-entity failures that did not abort the run.
    pub failures: Vec<EntityFailure>,
}

impl JobOutcome {
    /// Outcome for a run whose query matched `count` entities.
    pub fn matched(count: usize) -> Self {
        Self {
            entities_matched: count,
            ..Self::default()
        }
    }

    /// Record a per-entity failure.
    pub fn record_failure(&mut self, entity_id: Uuid, kind: FailureKind, message: impl Into<String>) {
        self.failures.push(EntityFailure {
            entity_id,
            kind,
            message: message.into(),
        });
    }
}

/// Terminal state of one handler invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// The handler returned normally (entity failures may still be present).
    Succeeded,
    /// The handler failed, timed out, or panicked.
    Failed {
        /// Failure category.
        kind: FailureKind,
        /// Error detail.
        message: String,
    },
}

/// Structured record of one job invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRunResult {
    /// Registered job name.
    pub job_name: String,
    /// Logical time of the tick that triggered the run.
    pub tick_time: DateTime<Utc>,
    /// Wall-clock start.
    pub started_at: DateTime<Utc>,
    /// Wall-clock finish.
    pub finished_at: DateTime<Utc>,
    /// Entities the handler's query returned.
    pub entities_matched: usize,
    /// Entities the handler acted on.
    pub entities_processed: usize,
    /// Per-entity failures.
    pub errors: Vec<EntityFailure>,
    /// Whether the handler itself succeeded.
    #[serde(flatten)]
    pub status: RunStatus,
}

impl JobRunResult {
    /// Build the record for a finished invocation.
    pub fn new(
        job_name: impl Into<String>,
        tick: TickEvent,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        result: Result<JobOutcome, JobExecutionError>,
    ) -> Self {
        let (outcome, status) = match result {
            Ok(outcome) => (outcome, RunStatus::Succeeded),
            Err(err) => (
                JobOutcome::default(),
                RunStatus::Failed {
                    kind: err.kind(),
                    message: err.to_string(),
                },
            ),
        };

        Self {
            job_name: job_name.into(),
            tick_time: tick.logical_time,
            started_at,
            finished_at,
            entities_matched: outcome.entities_matched,
            entities_processed: outcome.entities_processed,
            errors: outcome.failures,
            status,
        }
    }

    /// Whether the handler returned normally.
    pub fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded)
    }

    /// Run duration in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        (self.finished_at - self.started_at).num_milliseconds()
    }
}

/// Receives every [`JobRunResult`]; the scheduler's only audit trail.
pub trait RunObserver: Send + Sync + std::fmt::Debug {
    /// Called once per finished invocation.
    fn record(&self, result: &JobRunResult);
}

/// Writes each run as one structured log event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn record(&self, result: &JobRunResult) {
        match &result.status {
            RunStatus::Succeeded if result.errors.is_empty() => {
                tracing::info!(
                    job = %result.job_name,
                    tick = %result.tick_time,
                    matched = result.entities_matched,
                    processed = result.entities_processed,
                    duration_ms = result.duration_ms(),
                    "Job run completed"
                );
            }
            RunStatus::Succeeded => {
                let errors = serde_json::to_string(&result.errors).unwrap_or_default();
                tracing::warn!(
                    job = %result.job_name,
                    tick = %result.tick_time,
                    matched = result.entities_matched,
                    processed = result.entities_processed,
                    error_count = result.errors.len(),
                    errors = %errors,
                    duration_ms = result.duration_ms(),
                    "Job run completed with errors"
                );
            }
            RunStatus::Failed { kind, message } => {
                tracing::error!(
                    job = %result.job_name,
                    tick = %result.tick_time,
                    kind = ?kind,
                    error = %message,
                    duration_ms = result.duration_ms(),
                    "Job run failed"
                );
            }
        }
    }
}
