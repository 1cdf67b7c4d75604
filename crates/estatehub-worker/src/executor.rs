//! Job handler trait and the executor that invokes handlers safely.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use estatehub_core::error::AppError;

use crate::clock::TickEvent;
use crate::registry::RegisteredJob;
use crate::report::{FailureKind, JobOutcome, JobRunResult};

/// Trait for job handler implementations
#[async_trait]
pub trait JobHandler: Send + Sync + std::fmt::Debug {
    /// Run once for the given tick.
    async fn run(&self, tick: TickEvent) -> Result<JobOutcome, JobExecutionError>;
}

/// Error from job execution
#[derive(Debug, thiserror::Error)]
pub enum JobExecutionError {
    /// The handler did not finish within its timeout.
    #[error("Handler timed out after {0:?}")]
    Timeout(Duration),

    /// The data store could not be queried; the tick is a no-op for this job.
    #[error("Query failed: {0}")]
    Query(#[source] AppError),

    /// The handler panicked.
    #[error("Handler panicked: {0}")]
    Panicked(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl JobExecutionError {
    /// Failure category recorded in the run result.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Timeout(_) => FailureKind::Timeout,
            Self::Query(_) => FailureKind::Query,
            Self::Panicked(_) => FailureKind::Panic,
            Self::Internal(_) => FailureKind::Internal,
        }
    }
}

/// Adapts an async closure into a [`JobHandler`].
pub struct FnHandler<F> {
    name: &'static str,
    f: F,
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler").field("name", &self.name).finish()
    }
}

#[async_trait]
impl<F, Fut> JobHandler for FnHandler<F>
where
    F: Fn(TickEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JobOutcome, JobExecutionError>> + Send + 'static,
{
    async fn run(&self, tick: TickEvent) -> Result<JobOutcome, JobExecutionError> {
        (self.f)(tick).await
    }
}

/// Wrap an async closure as a shareable handler.
pub fn handler_fn<F, Fut>(name: &'static str, f: F) -> Arc<dyn JobHandler>
where
    F: Fn(TickEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<JobOutcome, JobExecutionError>> + Send + 'static,
{
    Arc::new(FnHandler { name, f })
}

/// Invokes handlers under a timeout, isolating panics.
#[derive(Debug, Clone)]
pub struct JobExecutor {
    /// Timeout for jobs that do not set their own.
    default_timeout: Duration,
}

impl JobExecutor {
    /// Create a new job executor
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout }
    }

    /// Timeout applied to jobs without their own.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Run a job's handler once and describe what happened.
    ///
    /// The handler runs on its own task: a panic surfaces as
    /// [`JobExecutionError::Panicked`] and a timeout aborts the task.
    pub async fn execute(&self, job: &RegisteredJob, tick: TickEvent) -> JobRunResult {
        let definition = job.definition();
        let timeout = definition.timeout.unwrap_or(self.default_timeout);
        let handler = Arc::clone(&definition.handler);

        tracing::debug!(
            job = %definition.name,
            tick = %tick.logical_time,
            timeout_ms = timeout.as_millis() as u64,
            "Executing job"
        );

        let started_at = Utc::now();
        let task = tokio::spawn(async move { handler.run(tick).await });
        let abort = task.abort_handle();

        let result = match tokio::time::timeout(timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) if join_err.is_panic() => {
                Err(JobExecutionError::Panicked(panic_message(join_err.into_panic())))
            }
            Ok(Err(join_err)) => Err(JobExecutionError::Internal(AppError::internal(format!(
                "Handler task cancelled: {join_err}"
            )))),
            Err(_) => {
                abort.abort();
                Err(JobExecutionError::Timeout(timeout))
            }
        };

        JobRunResult::new(definition.name.clone(), tick, started_at, Utc::now(), result)
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
