//! Reminder kinds and their per-meeting flags.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which reminder a job is sending.
///
/// Each kind has its own boolean flag on the meeting row. A flag only
/// ever moves from `false` to `true` while the scheduler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReminderKind {
    /// Sent once on the day of the meeting.
    Day,
    /// Sent once shortly before the meeting starts.
    Hour,
}

impl ReminderKind {
    /// Column holding this kind's sent flag.
    pub fn flag_column(&self) -> &'static str {
        match self {
            Self::Day => "day_reminder_sent",
            Self::Hour => "hour_reminder_sent",
        }
    }

    /// Template identifier passed to notification senders.
    pub fn template(&self) -> &'static str {
        match self {
            Self::Day => "meeting_day_reminder",
            Self::Hour => "meeting_hour_reminder",
        }
    }

    /// Return the kind as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Day => "day",
            Self::Hour => "hour",
        }
    }
}

impl fmt::Display for ReminderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
