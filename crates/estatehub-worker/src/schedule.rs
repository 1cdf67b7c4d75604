//! Schedule specifications and next-fire computation.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};
use cron::Schedule;

use estatehub_core::error::AppError;

/// When a job fires.
///
/// Both variants fire on calendar boundaries rather than counting from the
/// last run, so a process that was asleep resumes at the next boundary
/// instead of replaying the ones it missed.
#[derive(Clone)]
pub enum ScheduleSpec {
    /// Every `period`, aligned to multiples of the period since the Unix
    /// epoch (a 10 minute interval fires at :00, :10, :20 ...).
    Interval(Duration),
    /// A six- or seven-field cron expression (seconds first) evaluated in
    /// a fixed UTC offset.
    Cron {
        /// Source expression, kept for logging.
        expression: String,
        /// Parsed schedule.
        schedule: Box<Schedule>,
        /// Timezone the expression is evaluated in.
        offset: FixedOffset,
    },
}

impl ScheduleSpec {
    /// Fixed interval schedule. Rejects zero and sub-millisecond periods.
    pub fn interval(period: Duration) -> Result<Self, AppError> {
        if period.as_millis() == 0 {
            return Err(AppError::configuration(
                "Schedule interval must be at least one millisecond",
            ));
        }
        Ok(Self::Interval(period))
    }

    /// Every `n` seconds.
    pub fn every_seconds(n: u64) -> Result<Self, AppError> {
        Self::interval(Duration::from_secs(n))
    }

    /// Every `n` minutes.
    pub fn every_minutes(n: u64) -> Result<Self, AppError> {
        Self::interval(Duration::from_secs(n * 60))
    }

    /// Cron expression evaluated in `offset`.
    pub fn cron(expression: &str, offset: FixedOffset) -> Result<Self, AppError> {
        let schedule = Schedule::from_str(expression).map_err(|e| {
            AppError::with_source(
                estatehub_core::error::ErrorKind::Configuration,
                format!("Invalid cron expression '{expression}': {e}"),
                e,
            )
        })?;
        Ok(Self::Cron {
            expression: expression.to_string(),
            schedule: Box::new(schedule),
            offset,
        })
    }

    /// Once a day at `hour:minute` local time.
    pub fn daily_at(hour: u32, minute: u32, offset: FixedOffset) -> Result<Self, AppError> {
        if hour > 23 || minute > 59 {
            return Err(AppError::configuration(format!(
                "Invalid time of day {hour:02}:{minute:02}"
            )));
        }
        Self::cron(&format!("0 {minute} {hour} * * *"), offset)
    }

    /// The first fire time strictly after `after`.
    ///
    /// A cron expression with no future occurrence never fires again and
    /// yields [`DateTime::<Utc>::MAX_UTC`].
    pub fn next_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Self::Interval(period) => {
                let period_ms = i64::try_from(period.as_millis()).unwrap_or(i64::MAX);
                let boundary = after
                    .timestamp_millis()
                    .div_euclid(period_ms)
                    .saturating_add(1)
                    .saturating_mul(period_ms);
                DateTime::from_timestamp_millis(boundary).unwrap_or(DateTime::<Utc>::MAX_UTC)
            }
            Self::Cron {
                schedule, offset, ..
            } => schedule
                .after(&after.with_timezone(offset))
                .next()
                .map(|next| next.with_timezone(&Utc))
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }
}

impl fmt::Debug for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

impl fmt::Display for ScheduleSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval(period) => write!(f, "every {}s", period.as_secs_f64()),
            Self::Cron {
                expression, offset, ..
            } => write!(f, "cron '{expression}' ({offset})"),
        }
    }
}
