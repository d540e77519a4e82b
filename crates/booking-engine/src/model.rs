//! Booking records and the request shape they are created from.

use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{BookingError, Result};
use crate::interval::TimeInterval;

pub type OccurrenceId = Uuid;
pub type SeriesId = Uuid;
pub type RoomId = i64;
pub type UserId = i64;

/// How a booking repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurrencePattern {
    /// A single standalone booking.
    #[default]
    Only,
    Daily,
    Weekly,
}

impl RecurrencePattern {
    pub fn is_recurring(self) -> bool {
        self != RecurrencePattern::Only
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RecurrencePattern::Only => "ONLY",
            RecurrencePattern::Daily => "DAILY",
            RecurrencePattern::Weekly => "WEEKLY",
        }
    }
}

impl FromStr for RecurrencePattern {
    type Err = BookingError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ONLY" => Ok(RecurrencePattern::Only),
            "DAILY" => Ok(RecurrencePattern::Daily),
            "WEEKLY" => Ok(RecurrencePattern::Weekly),
            _ => Err(BookingError::InvalidRecurrence(format!(
                "unknown recurrence pattern '{s}'"
            ))),
        }
    }
}

impl std::fmt::Display for RecurrencePattern {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A bookable room, owned by the surrounding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

/// A user known to the surrounding service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// The user on whose behalf an operation runs.
///
/// Passed explicitly to every mutating operation; the engine keeps no
/// ambient notion of a current user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Actor {
    pub id: UserId,
}

impl Actor {
    pub fn new(id: UserId) -> Self {
        Self { id }
    }
}

/// One concrete, single-date booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Occurrence {
    pub id: OccurrenceId,
    /// Shared by every occurrence expanded from one request; `None` for a
    /// standalone booking.
    pub series_id: Option<SeriesId>,
    pub title: String,
    pub content_brief: String,
    pub room_id: RoomId,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub recurrence_pattern: RecurrencePattern,
    /// Last date of the series, inclusive. Only set for recurring patterns.
    pub recurrence_end_date: Option<NaiveDate>,
    pub attendee_ids: BTreeSet<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub creator_name: String,
    pub updator_id: UserId,
    pub updator_name: String,
}

impl Occurrence {
    pub fn interval(&self) -> TimeInterval {
        TimeInterval {
            date: self.date,
            start: self.start_time,
            end: self.end_time,
        }
    }

    /// A sibling of this occurrence on another date.
    ///
    /// Copies every series-invariant field and stamps the new date and a
    /// fresh id. The field list is spelled out so that adding a field to
    /// `Occurrence` forces a decision here.
    pub fn recur_on(&self, date: NaiveDate) -> Occurrence {
        Occurrence {
            id: Uuid::new_v4(),
            series_id: self.series_id,
            title: self.title.clone(),
            content_brief: self.content_brief.clone(),
            room_id: self.room_id,
            date,
            start_time: self.start_time,
            end_time: self.end_time,
            recurrence_pattern: self.recurrence_pattern,
            recurrence_end_date: self.recurrence_end_date,
            attendee_ids: self.attendee_ids.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            creator_id: self.creator_id,
            creator_name: self.creator_name.clone(),
            updator_id: self.updator_id,
            updator_name: self.updator_name.clone(),
        }
    }

    /// Whether two occurrences carry the same series-invariant fields.
    pub fn same_series_fields(&self, other: &Occurrence) -> bool {
        self.series_id == other.series_id
            && self.title == other.title
            && self.room_id == other.room_id
            && self.start_time == other.start_time
            && self.end_time == other.end_time
            && self.recurrence_pattern == other.recurrence_pattern
            && self.recurrence_end_date == other.recurrence_end_date
            && self.attendee_ids == other.attendee_ids
    }

    /// Whether `user` created this occurrence or attends it.
    pub fn involves(&self, user: UserId) -> bool {
        self.creator_id == user || self.attendee_ids.contains(&user)
    }
}

/// An appointment request as submitted by a caller.
///
/// Dates and times stay textual until validation so that every malformed
/// field can be reported at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppointmentRequest {
    pub title: String,
    pub content_brief: String,
    pub room_id: RoomId,
    /// `YYYY-MM-DD`.
    pub date: Option<String>,
    /// `HH:mm`.
    pub start_time: Option<String>,
    /// `HH:mm`.
    pub end_time: Option<String>,
    /// `ONLY`, `DAILY` or `WEEKLY`, any case.
    pub recurrence_pattern: String,
    /// `YYYY-MM-DD`, required unless the pattern is `ONLY`.
    pub recurrence_end_date: Option<String>,
    /// Weekday names for `WEEKLY`, e.g. `["MONDAY", "WEDNESDAY"]`.
    pub weekdays: Vec<String>,
    pub attendee_ids: Vec<UserId>,
}
