//! In-process meeting store backed by a `DashMap`.
//!
//! Used by single-instance deployments without PostgreSQL, by demos, and
//! by the test suites. Conditional updates hold the entry's shard lock for
//! the whole check-and-set, so concurrent callers cannot both win.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use estatehub_core::error::AppError;
use estatehub_core::result::AppResult;
use estatehub_entity::meeting::{CreateMeeting, Meeting, MeetingStatus};
use estatehub_entity::reminder::ReminderKind;

use crate::store::{DueQuery, MeetingStore};

/// Meeting store kept entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryMeetingStore {
    meetings: DashMap<Uuid, Meeting>,
}

impl InMemoryMeetingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a meeting as-is.
    pub fn insert(&self, meeting: Meeting) {
        self.meetings.insert(meeting.id, meeting);
    }

    /// Create a new pending meeting.
    pub fn create(&self, data: CreateMeeting, now: DateTime<Utc>) -> Meeting {
        let meeting = data.into_meeting(Uuid::now_v7(), now);
        self.meetings.insert(meeting.id, meeting.clone());
        meeting
    }

    /// Snapshot of a single meeting.
    pub fn get(&self, id: Uuid) -> Option<Meeting> {
        self.meetings.get(&id).map(|entry| entry.value().clone())
    }

    /// Number of stored meetings.
    pub fn len(&self) -> usize {
        self.meetings.len()
    }

    /// Whether the store holds no meetings.
    pub fn is_empty(&self) -> bool {
        self.meetings.is_empty()
    }

    /// Apply a user-driven status change, rejecting illegal transitions.
    pub fn update_status(&self, id: Uuid, next: MeetingStatus) -> AppResult<Meeting> {
        let mut entry = self
            .meetings
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found(format!("Meeting {id} not found")))?;

        if !entry.status.can_transition_to(next) {
            return Err(AppError::validation(format!(
                "Cannot move meeting {id} from {} to {next}",
                entry.status
            )));
        }

        entry.status = next;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }

    /// Move a meeting to a new start time and re-arm both reminders.
    pub fn reschedule(&self, id: Uuid, scheduled_at: DateTime<Utc>) -> AppResult<Meeting> {
        let mut entry = self
            .meetings
            .get_mut(&id)
            .filter(|entry| entry.status.is_active())
            .ok_or_else(|| AppError::not_found(format!("No active meeting {id} to reschedule")))?;

        entry.scheduled_at = scheduled_at;
        entry.day_reminder_sent = false;
        entry.hour_reminder_sent = false;
        entry.updated_at = Utc::now();
        Ok(entry.clone())
    }
}

#[async_trait]
impl MeetingStore for InMemoryMeetingStore {
    async fn find_due(&self, query: &DueQuery) -> AppResult<Vec<Meeting>> {
        let mut due: Vec<Meeting> = self
            .meetings
            .iter()
            .filter(|entry| query.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        due.sort_by_key(|m| m.scheduled_at);
        Ok(due)
    }

    async fn conditional_mark_sent(&self, meeting_id: Uuid, kind: ReminderKind) -> AppResult<bool> {
        let Some(mut entry) = self.meetings.get_mut(&meeting_id) else {
            return Ok(false);
        };

        let flag = match kind {
            ReminderKind::Day => &mut entry.day_reminder_sent,
            ReminderKind::Hour => &mut entry.hour_reminder_sent,
        };
        if *flag {
            return Ok(false);
        }
        *flag = true;
        entry.updated_at = Utc::now();
        Ok(true)
    }

    async fn find_overdue(&self, now: DateTime<Utc>) -> AppResult<Vec<Meeting>> {
        let mut overdue: Vec<Meeting> = self
            .meetings
            .iter()
            .filter(|entry| entry.value().should_auto_complete(now))
            .map(|entry| entry.value().clone())
            .collect();
        overdue.sort_by_key(|m| m.scheduled_at);
        Ok(overdue)
    }

    async fn complete_if_active(&self, meeting_id: Uuid) -> AppResult<bool> {
        let Some(mut entry) = self.meetings.get_mut(&meeting_id) else {
            return Ok(false);
        };
        if !entry.status.is_active() {
            return Ok(false);
        }
        entry.status = MeetingStatus::Completed;
        entry.updated_at = Utc::now();
        Ok(true)
    }
}
