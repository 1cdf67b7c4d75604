//! Job runner: turns ticks into handler invocations.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::task::TaskTracker;

use crate::clock::TickEvent;
use crate::executor::JobExecutor;
use crate::registry::{Admission, JobRegistry, RegisteredJob};
use crate::report::RunObserver;

/// What one tick did, by job name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Jobs that started an invocation.
    pub started: Vec<String>,
    /// Jobs whose tick was deferred behind a running invocation.
    pub queued: Vec<String>,
    /// Jobs whose tick was dropped because they were still running.
    pub skipped: Vec<String>,
}

impl TickReport {
    /// Whether the tick touched no job at all.
    pub fn is_empty(&self) -> bool {
        self.started.is_empty() && self.queued.is_empty() && self.skipped.is_empty()
    }
}

/// Main job runner that invokes due jobs for each tick
#[derive(Debug)]
pub struct JobRunner {
    /// Registered jobs
    registry: Arc<JobRegistry>,
    /// Invokes handlers under timeout
    executor: Arc<JobExecutor>,
    /// Receives every run result
    observer: Arc<dyn RunObserver>,
    /// Tracks in-flight invocations for draining and shutdown
    tracker: TaskTracker,
}

impl JobRunner {
    /// Create a new job runner
    pub fn new(
        registry: Arc<JobRegistry>,
        executor: Arc<JobExecutor>,
        observer: Arc<dyn RunObserver>,
    ) -> Self {
        Self {
            registry,
            executor,
            observer,
            tracker: TaskTracker::new(),
        }
    }

    /// The registry this runner reads from.
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Number of invocations currently in flight.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Start every job due at the tick's logical time.
    ///
    /// Each invocation runs on its own task, so a slow, failing, or
    /// panicking handler never holds up the other jobs or the next tick.
    pub fn tick(&self, tick: TickEvent) -> TickReport {
        let now = tick.logical_time;
        let mut report = TickReport::default();

        let scheduled = self.registry.list_scheduled(now);
        if scheduled.is_empty() {
            return report;
        }
        let due = self.registry.list_due(now);
        self.registry.advance(now);

        for job in scheduled {
            if !due.iter().any(|d| Arc::ptr_eq(d, &job)) {
                tracing::debug!(
                    job = %job.name(),
                    tick = %now,
                    "Previous run still in progress, skipping tick"
                );
                report.skipped.push(job.name().to_string());
                continue;
            }

            match job.admit(tick) {
                Admission::Start => {
                    report.started.push(job.name().to_string());
                    self.spawn(job, tick);
                }
                Admission::Queued => {
                    tracing::debug!(job = %job.name(), tick = %now, "Run queued behind in-flight run");
                    report.queued.push(job.name().to_string());
                }
                Admission::Skipped => {
                    tracing::debug!(
                        job = %job.name(),
                        tick = %now,
                        "Previous run still in progress, skipping tick"
                    );
                    report.skipped.push(job.name().to_string());
                }
            }
        }

        report
    }

    fn spawn(&self, job: Arc<RegisteredJob>, tick: TickEvent) {
        let executor = Arc::clone(&self.executor);
        let observer = Arc::clone(&self.observer);

        self.tracker.spawn(async move {
            let mut next = Some(tick);
            while let Some(tick) = next {
                let result = executor.execute(&job, tick).await;
                // Release the slot before reporting; a broken observer must not wedge the job.
                next = job.finish();
                if std::panic::catch_unwind(AssertUnwindSafe(|| observer.record(&result))).is_err() {
                    tracing::error!(job = %result.job_name, "Run observer panicked while recording result");
                }
            }
        });
    }

    /// Wait until every in-flight invocation, including queued follow-ups,
    /// has finished. The runner keeps accepting ticks afterwards.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Wait up to `grace` for in-flight invocations. Returns `true` if all
    /// finished; anything still running after that is abandoned.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            tracing::info!(pending, grace_ms = grace.as_millis() as u64, "Waiting for in-flight jobs to complete...");
        }

        match tokio::time::timeout(grace, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    abandoned = self.tracker.len(),
                    "Grace period elapsed, abandoning in-flight jobs"
                );
                false
            }
        }
    }
}
