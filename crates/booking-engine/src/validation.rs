//! Request validation that collects every violation instead of stopping at
//! the first one.
//!
//! Rules run in a fixed order. Only two points stop early: an unknown
//! recurrence pattern (every later rule depends on it) and an unparseable or
//! missing date or time (ordering and conflict checks need real values).
//! The conflict check runs last and only for an otherwise clean request.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};

use crate::conflict::ConflictDetector;
use crate::error::{BookingError, Result};
use crate::interval::TimeInterval;
use crate::model::{AppointmentRequest, RecurrencePattern, RoomId, UserId};
use crate::recurrence::WorkWeek;
use crate::settings::BookingPolicy;

/// Request field names used as error keys.
pub mod field {
    pub const RECURRENCE_PATTERN: &str = "recurrencePattern";
    pub const DATE: &str = "date";
    pub const RECURRENCE_END_DATE: &str = "recurrenceEndDate";
    pub const START_TIME: &str = "startTime";
    pub const END_TIME: &str = "endTime";
    pub const WEEKDAYS: &str = "weekdays";
}

/// Field name → messages. Empty means the request is valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message for `field`. Repeating an identical message is a no-op.
    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        let messages = self.0.entry(field.to_string()).or_default();
        if !messages.contains(&message) {
            messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of fields with at least one error.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn into_inner(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(field, messages)| format!("{field}: {}", messages.join(", ")))
            .collect();
        f.write_str(&parts.join("; "))
    }
}

/// A request that passed every rule, with typed values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRequest {
    pub title: String,
    pub content_brief: String,
    pub room_id: RoomId,
    pub interval: TimeInterval,
    pub pattern: RecurrencePattern,
    /// Set for recurring patterns only.
    pub recurrence_end_date: Option<NaiveDate>,
    /// Set for `WEEKLY` only, Monday first.
    pub weekdays: Vec<Weekday>,
    pub attendee_ids: BTreeSet<UserId>,
}

/// Validates requests against a policy and a fixed "today".
pub struct Validator<'p> {
    policy: &'p BookingPolicy,
    today: NaiveDate,
}

impl<'p> Validator<'p> {
    pub fn new(policy: &'p BookingPolicy, today: NaiveDate) -> Self {
        Self { policy, today }
    }

    /// All violations of `request`; empty when it is valid.
    ///
    /// With a `detector`, a clean request is also checked for a conflict of
    /// its first occurrence, reported under `date`.
    ///
    /// # Errors
    /// Only collaborator failures from the conflict query.
    pub fn validate(
        &self,
        request: &AppointmentRequest,
        detector: Option<&ConflictDetector<'_>>,
    ) -> Result<ValidationErrors> {
        Ok(self.run(request, detector)?.err().unwrap_or_default())
    }

    /// Like [`Validator::validate`], but returns the typed request on success
    /// and `BookingError::Validation` otherwise.
    pub fn check(
        &self,
        request: &AppointmentRequest,
        detector: Option<&ConflictDetector<'_>>,
    ) -> Result<ValidRequest> {
        self.run(request, detector)?.map_err(BookingError::Validation)
    }

    fn run(
        &self,
        request: &AppointmentRequest,
        detector: Option<&ConflictDetector<'_>>,
    ) -> Result<std::result::Result<ValidRequest, ValidationErrors>> {
        let mut errors = ValidationErrors::new();

        // 1. Pattern. Nothing else is meaningful without it.
        let Ok(pattern) = request.recurrence_pattern.parse::<RecurrencePattern>() else {
            errors.add(
                field::RECURRENCE_PATTERN,
                "must be one of ONLY, DAILY, WEEKLY",
            );
            return Ok(Err(errors));
        };

        // 2. Date.
        let date = self.parse_date(field::DATE, request.date.as_deref(), &mut errors);

        // 3. Recurrence end date.
        let end_date = if pattern.is_recurring() {
            let end_date = self.parse_date(
                field::RECURRENCE_END_DATE,
                request.recurrence_end_date.as_deref(),
                &mut errors,
            );
            if let (Some(date), Some(end_date)) = (date, end_date) {
                self.check_series_span(date, end_date, &mut errors);
            }
            end_date
        } else {
            None
        };

        // 4. Times.
        let start_time = parse_time(field::START_TIME, request.start_time.as_deref(), &mut errors);
        let end_time = parse_time(field::END_TIME, request.end_time.as_deref(), &mut errors);

        // 5. Ordering and conflict checks need every value. Only missing or
        // unparseable values stop here; past dates keep collecting.
        let (Some(date), Some(start_time), Some(end_time)) = (date, start_time, end_time) else {
            return Ok(Err(errors));
        };
        if pattern.is_recurring() && end_date.is_none() {
            return Ok(Err(errors));
        }

        // 6. Time ordering.
        if end_time < start_time {
            errors.add(field::END_TIME, "must not be before startTime");
        }

        // 7. Weekdays.
        let mut weekdays = Vec::new();
        if pattern == RecurrencePattern::Weekly {
            weekdays = parse_weekdays(&request.weekdays, &mut errors);
        }

        // 8. Series ordering, re-confirmed on the parsed values.
        if let Some(end_date) = end_date {
            if end_date < date {
                errors.add(field::RECURRENCE_END_DATE, "must not be before date");
            }
        }

        if !errors.is_empty() {
            return Ok(Err(errors));
        }

        // The first booked date; a WEEKLY series may skip `date` itself.
        let mut first = date;
        if let (RecurrencePattern::Weekly, Some(end_date)) = (pattern, end_date) {
            let week = WorkWeek::from_days(&weekdays)?;
            let Some(day) = date
                .iter_days()
                .take_while(|d| *d <= end_date)
                .find(|d| week.contains(d.weekday()))
            else {
                errors.add(
                    field::WEEKDAYS,
                    "no selected weekday falls between date and recurrenceEndDate",
                );
                return Ok(Err(errors));
            };
            first = day;
        }

        let interval = TimeInterval {
            date,
            start: start_time,
            end: end_time,
        };

        // 9. Conflict of the first occurrence.
        if let Some(detector) = detector {
            let base = interval.on(first);
            if let Some(conflict) = detector.conflicts(request.room_id, &base)?.first() {
                let existing = conflict.existing.interval();
                errors.add(
                    field::DATE,
                    format!(
                        "room {} is already booked on {first} from {} to {}",
                        request.room_id,
                        existing.start.format("%H:%M"),
                        existing.end.format("%H:%M"),
                    ),
                );
                return Ok(Err(errors));
            }
        }

        Ok(Ok(ValidRequest {
            title: request.title.clone(),
            content_brief: request.content_brief.clone(),
            room_id: request.room_id,
            interval,
            pattern,
            recurrence_end_date: end_date,
            weekdays,
            attendee_ids: request.attendee_ids.iter().copied().collect(),
        }))
    }

    fn parse_date(
        &self,
        name: &str,
        value: Option<&str>,
        errors: &mut ValidationErrors,
    ) -> Option<NaiveDate> {
        let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            errors.add(name, "is required");
            return None;
        };
        let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") else {
            errors.add(name, "must be a valid date (YYYY-MM-DD)");
            return None;
        };
        if date < self.today {
            errors.add(name, "must not be in the past");
        }
        Some(date)
    }

    fn check_series_span(&self, date: NaiveDate, end_date: NaiveDate, errors: &mut ValidationErrors) {
        if end_date < date {
            errors.add(field::RECURRENCE_END_DATE, "must not be before date");
        } else if (end_date - date).num_days() > i64::from(self.policy.max_series_days) {
            errors.add(
                field::RECURRENCE_END_DATE,
                format!(
                    "must be within {} days of date",
                    self.policy.max_series_days
                ),
            );
        }
    }
}

/// Parse `HH:mm`, 00:00 to 23:59, two digits each.
fn parse_time(name: &str, value: Option<&str>, errors: &mut ValidationErrors) -> Option<NaiveTime> {
    let Some(value) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        errors.add(name, "is required");
        return None;
    };
    let well_formed = value.len() == 5
        && value.as_bytes()[2] == b':'
        && value
            .bytes()
            .enumerate()
            .all(|(i, b)| i == 2 || b.is_ascii_digit());
    let parsed = well_formed
        .then(|| NaiveTime::parse_from_str(value, "%H:%M").ok())
        .flatten();
    if parsed.is_none() {
        errors.add(name, "must be a time between 00:00 and 23:59 (HH:mm)");
    }
    parsed
}

/// Parse weekday tokens, reporting each unusable one on its own.
fn parse_weekdays(tokens: &[String], errors: &mut ValidationErrors) -> Vec<Weekday> {
    if tokens.iter().all(|t| t.trim().is_empty()) {
        errors.add(field::WEEKDAYS, "at least one weekday is required for WEEKLY");
        return Vec::new();
    }
    let mut week = WorkWeek::new();
    for token in tokens.iter().filter(|t| !t.trim().is_empty()) {
        match WorkWeek::parse_day(token).and_then(|day| week.insert(day)) {
            Ok(()) => {}
            Err(BookingError::InvalidRecurrence(message)) => errors.add(field::WEEKDAYS, message),
            Err(other) => errors.add(field::WEEKDAYS, other.to_string()),
        }
    }
    week.days().collect()
}
