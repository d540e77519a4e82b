//! Recurrence expansion -- turns one base occurrence plus a recurrence rule
//! into the concrete, ascending sequence of single-date occurrences.
//!
//! Only three shapes exist: a single booking (`ONLY`), every day (`DAILY`)
//! and selected working days of the week (`WEEKLY`). Weekly series are
//! restricted to Monday through Friday.

use chrono::{Datelike, NaiveDate, Weekday};

use crate::error::{BookingError, Result};
use crate::model::{Occurrence, RecurrencePattern};

const WORKING_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

/// A set of working days (Monday through Friday).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkWeek(u8);

impl WorkWeek {
    pub fn new() -> Self {
        Self(0)
    }

    /// Build a set from weekdays, rejecting Saturday and Sunday.
    pub fn from_days(days: &[Weekday]) -> Result<Self> {
        let mut week = Self::new();
        for &day in days {
            week.insert(day)?;
        }
        Ok(week)
    }

    /// Parse one weekday token: an English day name, full or three-letter,
    /// in any case. Weekend days are rejected.
    pub fn parse_day(token: &str) -> Result<Weekday> {
        let day: Weekday = token.trim().parse().map_err(|_| {
            BookingError::InvalidRecurrence(format!("'{token}' is not a weekday"))
        })?;
        if !WORKING_DAYS.contains(&day) {
            return Err(BookingError::InvalidRecurrence(format!(
                "'{token}' is not a working day (Monday to Friday)"
            )));
        }
        Ok(day)
    }

    pub fn insert(&mut self, day: Weekday) -> Result<()> {
        if !WORKING_DAYS.contains(&day) {
            return Err(BookingError::InvalidRecurrence(format!(
                "{day} is not a working day (Monday to Friday)"
            )));
        }
        self.0 |= 1 << day.num_days_from_monday();
        Ok(())
    }

    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// The days in the set, Monday first.
    pub fn days(&self) -> impl Iterator<Item = Weekday> + '_ {
        let week = *self;
        WORKING_DAYS.into_iter().filter(move |d| week.contains(*d))
    }
}

/// The result of expanding a base occurrence.
///
/// Holds only the rule, never a cursor: [`Expansion::dates`] and
/// [`Expansion::occurrences`] start from the first date on every call.
#[derive(Debug, Clone)]
pub struct Expansion {
    template: Occurrence,
    first: NaiveDate,
    last: NaiveDate,
    weekdays: Option<WorkWeek>,
}

/// Expand `base` according to `pattern`.
///
/// - `ONLY` yields exactly `base.date`; `end_date` and `weekdays` are ignored.
/// - `DAILY` yields every date from `base.date` to `end_date` inclusive.
/// - `WEEKLY` yields the dates in that range whose weekday is in `weekdays`.
///
/// The returned template carries `pattern` and, for recurring patterns,
/// `end_date` as its `recurrence_end_date`.
///
/// # Errors
/// Returns `BookingError::InvalidRecurrence` if a recurring pattern has no
/// end date or one before `base.date`, or if a `WEEKLY` pattern has no
/// weekdays or includes Saturday or Sunday.
pub fn expand(
    base: &Occurrence,
    pattern: RecurrencePattern,
    end_date: Option<NaiveDate>,
    weekdays: Option<&[Weekday]>,
) -> Result<Expansion> {
    let mut template = base.clone();
    template.recurrence_pattern = pattern;

    if pattern == RecurrencePattern::Only {
        template.recurrence_end_date = None;
        return Ok(Expansion {
            template,
            first: base.date,
            last: base.date,
            weekdays: None,
        });
    }

    let last = end_date.ok_or_else(|| {
        BookingError::InvalidRecurrence(format!("{pattern} recurrence needs an end date"))
    })?;
    if last < base.date {
        return Err(BookingError::InvalidRecurrence(format!(
            "recurrence ends on {last}, before it starts on {}",
            base.date
        )));
    }
    template.recurrence_end_date = Some(last);

    let weekdays = match pattern {
        RecurrencePattern::Weekly => {
            let week = WorkWeek::from_days(weekdays.unwrap_or_default())?;
            if week.is_empty() {
                return Err(BookingError::InvalidRecurrence(
                    "WEEKLY recurrence needs at least one weekday".to_string(),
                ));
            }
            Some(week)
        }
        _ => None,
    };

    Ok(Expansion {
        template,
        first: base.date,
        last,
        weekdays,
    })
}

impl Expansion {
    /// Occurrence dates in ascending order.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        let last = self.last;
        let weekdays = self.weekdays;
        self.first
            .iter_days()
            .take_while(move |d| *d <= last)
            .filter(move |d| weekdays.map_or(true, |w| w.contains(d.weekday())))
    }

    /// One full occurrence per date, each with a fresh id.
    pub fn occurrences(&self) -> impl Iterator<Item = Occurrence> + '_ {
        self.dates().map(move |date| self.template.recur_on(date))
    }

    pub fn len(&self) -> usize {
        self.dates().count()
    }

    pub fn is_empty(&self) -> bool {
        self.dates().next().is_none()
    }

    pub fn pattern(&self) -> RecurrencePattern {
        self.template.recurrence_pattern
    }

    pub fn first_date(&self) -> NaiveDate {
        self.first
    }

    pub fn last_date(&self) -> NaiveDate {
        self.last
    }

    pub fn weekdays(&self) -> Option<WorkWeek> {
        self.weekdays
    }

    /// The equivalent RFC 5545 RRULE, or `None` for a single booking.
    ///
    /// `UNTIL` is the last second of the end date in UTC, so the rule pairs
    /// with a UTC `DTSTART` on the first date.
    pub fn to_rrule(&self) -> Option<String> {
        let until = format!("UNTIL={}T235959Z", self.last.format("%Y%m%d"));
        match (self.pattern(), self.weekdays) {
            (RecurrencePattern::Only, _) => None,
            (RecurrencePattern::Weekly, Some(week)) => {
                let byday: Vec<&str> = week.days().map(rrule_day).collect();
                Some(format!("FREQ=WEEKLY;BYDAY={};{until}", byday.join(",")))
            }
            _ => Some(format!("FREQ=DAILY;{until}")),
        }
    }
}

fn rrule_day(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "MO",
        Weekday::Tue => "TU",
        Weekday::Wed => "WE",
        Weekday::Thu => "TH",
        Weekday::Fri => "FR",
        Weekday::Sat => "SA",
        Weekday::Sun => "SU",
    }
}
