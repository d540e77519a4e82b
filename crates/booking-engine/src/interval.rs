//! Time intervals on a single calendar day and their overlap arithmetic.
//!
//! Every occurrence occupies one `TimeInterval`: a date plus a start and end
//! time-of-day. Two intervals can only collide when they fall on the same
//! date; whether touching endpoints collide is decided by [`BoundaryPolicy`].

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};

/// How intervals that merely touch (`a.end == b.start`) are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundaryPolicy {
    /// Closed intervals: a 09:00-10:00 booking blocks a 10:00-11:00 one.
    #[default]
    Inclusive,
    /// Half-open intervals: back-to-back bookings are allowed.
    Exclusive,
}

/// A `[start, end]` time range on one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    pub date: NaiveDate,
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeInterval {
    /// Build an interval, rejecting `end < start`.
    ///
    /// A zero-length interval (`start == end`) is allowed.
    pub fn new(date: NaiveDate, start: NaiveTime, end: NaiveTime) -> Result<Self> {
        if end < start {
            return Err(BookingError::InvalidInterval(format!(
                "interval on {date} ends at {end} before it starts at {start}"
            )));
        }
        Ok(Self { date, start, end })
    }

    /// The same time range moved to another date.
    pub fn on(&self, date: NaiveDate) -> Self {
        Self { date, ..*self }
    }

    /// Whether two intervals collide under the given boundary policy.
    ///
    /// Intervals on different dates never collide.
    pub fn overlaps(&self, other: &TimeInterval, policy: BoundaryPolicy) -> bool {
        if self.date != other.date {
            return false;
        }
        match policy {
            BoundaryPolicy::Inclusive => self.start <= other.end && other.start <= self.end,
            BoundaryPolicy::Exclusive => self.start < other.end && other.start < self.end,
        }
    }

    /// Length of the shared part of two intervals in minutes, 0 if disjoint.
    pub fn overlap_minutes(&self, other: &TimeInterval) -> i64 {
        if self.date != other.date {
            return 0;
        }
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if end <= start {
            return 0;
        }
        (end - start).num_minutes()
    }

    pub fn duration_minutes(&self) -> i64 {
        (self.end - self.start).num_minutes()
    }
}

impl std::fmt::Display for TimeInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {}-{}",
            self.date,
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}
