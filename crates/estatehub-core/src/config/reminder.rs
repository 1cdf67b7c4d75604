//! Meeting reminder and status job configuration.

use std::time::Duration;

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Largest UTC offset accepted for the deployment timezone (14 hours).
const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Schedules and windows for the meeting jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderConfig {
    /// Cron expression (seconds first) for the day reminder job,
    /// evaluated in the deployment timezone.
    #[serde(default = "default_day_reminder_cron")]
    pub day_reminder_cron: String,
    /// How often the hour reminder job scans, in minutes.
    #[serde(default = "default_hour_interval")]
    pub hour_reminder_interval_minutes: u64,
    /// How far ahead the hour reminder job looks, in minutes.
    #[serde(default = "default_hour_lookahead")]
    pub hour_lookahead_minutes: u64,
    /// How often the status update job runs, in seconds.
    #[serde(default = "default_status_interval")]
    pub status_update_interval_seconds: u64,
    /// Deployment timezone as an offset from UTC in minutes.
    ///
    /// The offset is fixed: deployments in a zone with daylight saving must
    /// update it at each transition, or the day window and the day reminder
    /// cron run an hour off for the part of the year the offset does not match.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl ReminderConfig {
    /// Resolve the deployment timezone offset.
    pub fn utc_offset(&self) -> Result<FixedOffset, AppError> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(AppError::configuration(format!(
                "reminders.utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        FixedOffset::east_opt(self.utc_offset_minutes * 60).ok_or_else(|| {
            AppError::configuration(format!(
                "Invalid UTC offset: {} minutes",
                self.utc_offset_minutes
            ))
        })
    }

    /// Hour reminder scan interval.
    pub fn hour_interval(&self) -> Duration {
        Duration::from_secs(self.hour_reminder_interval_minutes * 60)
    }

    /// Hour reminder lookahead window length.
    pub fn hour_lookahead(&self) -> Duration {
        Duration::from_secs(self.hour_lookahead_minutes * 60)
    }

    /// Status update interval.
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_update_interval_seconds)
    }
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            day_reminder_cron: default_day_reminder_cron(),
            hour_reminder_interval_minutes: default_hour_interval(),
            hour_lookahead_minutes: default_hour_lookahead(),
            status_update_interval_seconds: default_status_interval(),
            utc_offset_minutes: 0,
        }
    }
}

fn default_day_reminder_cron() -> String {
    "0 0 8 * * *".to_string()
}

fn default_hour_interval() -> u64 {
    10
}

fn default_hour_lookahead() -> u64 {
    60
}

fn default_status_interval() -> u64 {
    60
}
