//! Meeting entity model.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::status::MeetingStatus;
use crate::reminder::ReminderKind;

/// A meeting between an agency's agent and a customer, usually a
/// property viewing.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meeting {
    /// Unique meeting identifier.
    pub id: Uuid,
    /// Owning agency.
    pub agency_id: Uuid,
    /// Short title shown in reminders.
    pub title: String,
    /// Address of the property being visited, if any.
    pub property_address: Option<String>,
    /// Agency display name.
    pub agency_name: String,
    /// Agency contact address.
    pub agency_email: Option<String>,
    /// Assigned agent display name.
    pub agent_name: String,
    /// Assigned agent address.
    pub agent_email: Option<String>,
    /// Customer display name.
    pub customer_name: String,
    /// Customer address.
    pub customer_email: Option<String>,
    /// Start of the meeting.
    pub scheduled_at: DateTime<Utc>,
    /// Length of the meeting in minutes.
    pub duration_minutes: i32,
    /// Current lifecycle status.
    pub status: MeetingStatus,
    /// Whether the day-of reminder went out.
    pub day_reminder_sent: bool,
    /// Whether the pre-meeting reminder went out.
    pub hour_reminder_sent: bool,
    /// When the meeting was created.
    pub created_at: DateTime<Utc>,
    /// When the meeting was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    /// When the meeting ends.
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(i64::from(self.duration_minutes.max(0)))
    }

    /// Whether the reminder of the given kind has already been sent.
    pub fn reminder_sent(&self, kind: ReminderKind) -> bool {
        match kind {
            ReminderKind::Day => self.day_reminder_sent,
            ReminderKind::Hour => self.hour_reminder_sent,
        }
    }

    /// Whether the status job should move this meeting to `Completed` at `now`.
    pub fn should_auto_complete(&self, now: DateTime<Utc>) -> bool {
        self.status.is_active() && self.ends_at() <= now
    }
}

/// Data required to create a new meeting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMeeting {
    /// Owning agency.
    pub agency_id: Uuid,
    /// Short title.
    pub title: String,
    /// Property address.
    pub property_address: Option<String>,
    /// Agency display name.
    pub agency_name: String,
    /// Agency contact address.
    pub agency_email: Option<String>,
    /// Agent display name.
    pub agent_name: String,
    /// Agent address.
    pub agent_email: Option<String>,
    /// Customer display name.
    pub customer_name: String,
    /// Customer address.
    pub customer_email: Option<String>,
    /// Start of the meeting.
    pub scheduled_at: DateTime<Utc>,
    /// Length in minutes.
    pub duration_minutes: i32,
}

impl CreateMeeting {
    /// Build the stored row for this request, as a freshly created
    /// pending meeting with no reminders sent.
    pub fn into_meeting(self, id: Uuid, now: DateTime<Utc>) -> Meeting {
        Meeting {
            id,
            agency_id: self.agency_id,
            title: self.title,
            property_address: self.property_address,
            agency_name: self.agency_name,
            agency_email: self.agency_email,
            agent_name: self.agent_name,
            agent_email: self.agent_email,
            customer_name: self.customer_name,
            customer_email: self.customer_email,
            scheduled_at: self.scheduled_at,
            duration_minutes: self.duration_minutes,
            status: MeetingStatus::Pending,
            day_reminder_sent: false,
            hour_reminder_sent: false,
            created_at: now,
            updated_at: now,
        }
    }
}
