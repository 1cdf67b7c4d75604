//! The query/update surface the scheduler jobs consume.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use estatehub_core::result::AppResult;
use estatehub_entity::meeting::Meeting;
use estatehub_entity::reminder::ReminderKind;
use estatehub_entity::window::TimeWindow;

/// "Meetings in `window` that have not had a `kind` reminder yet."
///
/// Only pending and confirmed meetings match; cancelled and completed
/// meetings never receive reminders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DueQuery {
    /// Closed range over `scheduled_at`.
    pub window: TimeWindow,
    /// Which reminder flag must still be false.
    pub kind: ReminderKind,
}

impl DueQuery {
    /// Create a new due query.
    pub fn new(window: TimeWindow, kind: ReminderKind) -> Self {
        Self { window, kind }
    }

    /// Check a meeting against the query in memory.
    pub fn matches(&self, meeting: &Meeting) -> bool {
        meeting.status.is_active()
            && !meeting.reminder_sent(self.kind)
            && self.window.contains(meeting.scheduled_at)
    }
}

/// Storage operations used by the reminder and status jobs.
///
/// Implementations must make [`conditional_mark_sent`](Self::conditional_mark_sent)
/// and [`complete_if_active`](Self::complete_if_active) atomic: of any
/// number of concurrent callers for the same meeting, exactly one sees `true`.
#[async_trait]
pub trait MeetingStore: Send + Sync + std::fmt::Debug {
    /// Meetings matching `query`, ordered by `scheduled_at`.
    async fn find_due(&self, query: &DueQuery) -> AppResult<Vec<Meeting>>;

    /// Set the reminder flag for `kind` if it is still false.
    ///
    /// Returns `true` when this call flipped the flag. Never clears a flag.
    async fn conditional_mark_sent(&self, meeting_id: Uuid, kind: ReminderKind) -> AppResult<bool>;

    /// Pending or confirmed meetings whose end time is at or before `now`.
    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>>;

    /// Move a pending or confirmed meeting to completed.
    ///
    /// Returns `false` if the meeting is missing or already terminal.
    async fn complete_if_active(&self, meeting_id: Uuid) -> AppResult<bool>;
}
