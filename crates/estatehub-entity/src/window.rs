//! Closed time windows used to select meetings due for a time-based action.

use chrono::{DateTime, Duration, FixedOffset, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// A closed `[start, end]` range of instants.
///
/// Both ends are inclusive so a meeting sitting exactly on a boundary is
/// never missed because of clock skew between the scheduler and the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// First instant in the window.
    pub start: DateTime<Utc>,
    /// Last instant in the window.
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; `start` and `end` are swapped if given out of order.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        if start <= end {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    /// The calendar day containing `now` in the given timezone, from local
    /// midnight to the last microsecond before the next local midnight.
    pub fn day_of(now: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local_date = now.with_timezone(&offset).date_naive();
        let midnight = local_date.and_time(NaiveTime::MIN);
        // Fixed offsets have no gaps, so the local midnight always maps to one instant.
        let start = offset
            .from_local_datetime(&midnight)
            .single()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&midnight));
        let end = start + Duration::days(1) - Duration::microseconds(1);
        Self { start, end }
    }

    /// `[now, now + lookahead]`.
    pub fn lookahead(now: DateTime<Utc>, lookahead: Duration) -> Self {
        Self::new(now, now + lookahead)
    }

    /// Inclusive membership test.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}
