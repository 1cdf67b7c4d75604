//! Meeting status auto-complete job.

use std::sync::Arc;

use async_trait::async_trait;

use estatehub_database::store::MeetingStore;

use crate::clock::TickEvent;
use crate::executor::{JobExecutionError, JobHandler};
use crate::report::{FailureKind, JobOutcome};

/// Moves pending and confirmed meetings that have ended to `Completed`.
#[derive(Debug)]
pub struct StatusUpdateJob {
    store: Arc<dyn MeetingStore>,
}

impl StatusUpdateJob {
    /// Create a status update job
    pub fn new(store: Arc<dyn MeetingStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl JobHandler for StatusUpdateJob {
    async fn run(&self, tick: TickEvent) -> Result<JobOutcome, JobExecutionError> {
        let overdue = self
            .store
            .find_overdue(tick.logical_time)
            .await
            .map_err(JobExecutionError::Query)?;

        let mut outcome = JobOutcome::matched(overdue.len());

        for meeting in overdue {
            match self.store.complete_if_active(meeting.id).await {
                Ok(true) => {
                    tracing::info!(
                        meeting_id = %meeting.id,
                        ends_at = %meeting.ends_at(),
                        "Meeting marked completed"
                    );
                    outcome.entities_processed += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(meeting_id = %meeting.id, error = %e, "Failed to complete meeting");
                    outcome.record_failure(meeting.id, FailureKind::Query, e.to_string());
                }
            }
        }

        Ok(outcome)
    }
}
