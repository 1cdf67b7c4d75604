//! Day-of and pre-meeting reminder job.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, Utc};

use estatehub_database::store::{DueQuery, MeetingStore};
use estatehub_entity::reminder::ReminderKind;
use estatehub_entity::window::TimeWindow;

use crate::clock::TickEvent;
use crate::dispatch::NotificationDispatcher;
use crate::executor::{JobExecutionError, JobHandler};
use crate::report::{FailureKind, JobOutcome};

/// How a reminder job derives its window from the tick time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPolicy {
    /// The whole local calendar day containing the tick.
    Today {
        /// Timezone the day boundaries are taken in.
        offset: FixedOffset,
    },
    /// From the tick to `duration` after it.
    Lookahead {
        /// Window length.
        duration: Duration,
    },
}

impl WindowPolicy {
    /// The window for a tick at `now`.
    pub fn window_at(&self, now: DateTime<Utc>) -> TimeWindow {
        match *self {
            Self::Today { offset } => TimeWindow::day_of(now, offset),
            Self::Lookahead { duration } => TimeWindow::lookahead(now, duration),
        }
    }
}

/// Sends one reminder kind to every meeting in the tick's window that has
/// not had it yet.
///
/// Each meeting is claimed with a conditional flag update before anything
/// is sent, so of several overlapping runs or instances only one sends.
/// The flag stays set even when every delivery fails.
#[derive(Debug)]
pub struct ReminderJob {
    store: Arc<dyn MeetingStore>,
    dispatcher: NotificationDispatcher,
    kind: ReminderKind,
    window: WindowPolicy,
}

impl ReminderJob {
    /// Create a reminder job
    pub fn new(
        store: Arc<dyn MeetingStore>,
        dispatcher: NotificationDispatcher,
        kind: ReminderKind,
        window: WindowPolicy,
    ) -> Self {
        Self {
            store,
            dispatcher,
            kind,
            window,
        }
    }

    /// Reminder kind this job sends.
    pub fn kind(&self) -> ReminderKind {
        self.kind
    }
}

#[async_trait]
impl JobHandler for ReminderJob {
    async fn run(&self, tick: TickEvent) -> Result<JobOutcome, JobExecutionError> {
        let query = DueQuery::new(self.window.window_at(tick.logical_time), self.kind);

        let meetings = self
            .store
            .find_due(&query)
            .await
            .map_err(JobExecutionError::Query)?;

        let mut outcome = JobOutcome::matched(meetings.len());
        if meetings.is_empty() {
            return Ok(outcome);
        }

        tracing::info!(
            reminder = %self.kind,
            count = meetings.len(),
            window_start = %query.window.start,
            window_end = %query.window.end,
            "Sending reminders"
        );

        for meeting in meetings {
            match self.store.conditional_mark_sent(meeting.id, self.kind).await {
                Ok(true) => {}
                Ok(false) => {
                    tracing::debug!(
                        meeting_id = %meeting.id,
                        reminder = %self.kind,
                        "Reminder already claimed elsewhere"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(
                        meeting_id = %meeting.id,
                        reminder = %self.kind,
                        error = %e,
                        "Failed to claim reminder"
                    );
                    outcome.record_failure(meeting.id, FailureKind::Query, e.to_string());
                    continue;
                }
            }

            let report = self.dispatcher.dispatch(&meeting, self.kind).await;
            for (recipient, err) in report.failures() {
                outcome.record_failure(
                    meeting.id,
                    FailureKind::Delivery,
                    format!("{} <{}>: {}", recipient.role, recipient.email, err),
                );
            }
            outcome.entities_processed += 1;
        }

        Ok(outcome)
    }
}
