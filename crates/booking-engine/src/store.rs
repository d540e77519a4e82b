//! Collaborator interfaces the engine consumes, plus in-memory reference
//! implementations.
//!
//! Storage is reached only through [`OccurrenceStore::transaction`]. Every
//! read that feeds a conflict decision and every write that follows it run
//! inside one transaction, so a concurrent booking can never slip between
//! the check and the write.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::{Datelike, NaiveDate, NaiveTime};

use crate::error::{BookingError, Result};
use crate::model::{Occurrence, OccurrenceId, Room, RoomId, SeriesId, User, UserId};
use crate::recurrence::WorkWeek;
use crate::search::SearchFilter;

/// Room and user lookup, owned by the surrounding service.
pub trait Directory: Send + Sync {
    fn find_room_by_id(&self, id: RoomId) -> Result<Option<Room>>;
    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>>;
}

/// Occurrence reads and writes visible inside one transaction.
///
/// The conflict queries return *candidates*: implementations may narrow by
/// time, but callers always re-apply the overlap predicate themselves.
pub trait OccurrenceRepository {
    fn find_by_id(&self, id: OccurrenceId) -> Result<Option<Occurrence>>;

    fn exists_by_id(&self, id: OccurrenceId) -> Result<bool> {
        Ok(self.find_by_id(id)?.is_some())
    }

    /// Occurrences in `room_id` on `date` that may overlap `start..end`.
    fn find_occurrences_conflicting(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Vec<Occurrence>>;

    /// Occurrences in `room_id` between two dates (inclusive) that may overlap
    /// `start..end`, optionally only on the given weekdays.
    fn find_occurrences_overlapping_range(
        &self,
        room_id: RoomId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
        weekdays: Option<&WorkWeek>,
    ) -> Result<Vec<Occurrence>>;

    /// Every occurrence of a series, ordered by date.
    fn find_by_series(&self, series_id: SeriesId) -> Result<Vec<Occurrence>>;

    /// Every occurrence matching `filter`, ordered by date, start time, title.
    fn search(&self, filter: &SearchFilter) -> Result<Vec<Occurrence>>;

    /// Insert or replace by id.
    fn save(&mut self, occurrence: Occurrence) -> Result<Occurrence>;

    fn save_all(&mut self, occurrences: Vec<Occurrence>) -> Result<Vec<Occurrence>> {
        occurrences.into_iter().map(|o| self.save(o)).collect()
    }

    /// Returns whether a row was removed.
    fn delete_by_id(&mut self, id: OccurrenceId) -> Result<bool>;

    /// Remove every occurrence of `series_id` dated on or after `date`.
    /// Returns how many were removed.
    fn delete_by_series_from_date(&mut self, series_id: SeriesId, date: NaiveDate)
        -> Result<usize>;
}

/// Transactional access to stored occurrences.
pub trait OccurrenceStore: Send + Sync {
    /// Run `f` as one atomic, isolated unit.
    ///
    /// Writes made by `f` become visible to other transactions only if `f`
    /// returns `Ok`; on `Err` they are discarded. Two transactions that both
    /// check and book the same room must not interleave, either through
    /// locking or through an exclusion constraint that fails the later one.
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn OccurrenceRepository) -> Result<T>;
}

// ── In-memory implementations ──────────────────────────────────────────────

/// A process-local occurrence store.
///
/// Transactions are serialized by one mutex. They read the committed rows
/// directly; the first write stages a private copy, which replaces the
/// committed rows only on success. Read-only transactions never copy.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    rows: Mutex<BTreeMap<OccurrenceId, Occurrence>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_occurrences(occurrences: impl IntoIterator<Item = Occurrence>) -> Self {
        let rows = occurrences.into_iter().map(|o| (o.id, o)).collect();
        Self {
            rows: Mutex::new(rows),
        }
    }

    /// All committed occurrences, ordered by date, start time, title.
    pub fn snapshot(&self) -> Result<Vec<Occurrence>> {
        let rows = self.lock()?;
        let mut all: Vec<Occurrence> = rows.values().cloned().collect();
        sort_occurrences(&mut all);
        Ok(all)
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<OccurrenceId, Occurrence>>> {
        self.rows
            .lock()
            .map_err(|_| BookingError::Internal("occurrence store lock poisoned".to_string()))
    }
}

impl OccurrenceStore for InMemoryStore {
    fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut dyn OccurrenceRepository) -> Result<T>,
    {
        let mut committed = self.lock()?;
        let mut staged = StagedRows {
            rows: Cow::Borrowed(&*committed),
        };
        let value = f(&mut staged)?;
        let written = match staged.rows {
            Cow::Owned(rows) => Some(rows),
            Cow::Borrowed(_) => None,
        };
        if let Some(rows) = written {
            *committed = rows;
        }
        Ok(value)
    }
}

struct StagedRows<'a> {
    rows: Cow<'a, BTreeMap<OccurrenceId, Occurrence>>,
}

impl StagedRows<'_> {
    fn collect_sorted<P>(&self, predicate: P) -> Vec<Occurrence>
    where
        P: Fn(&Occurrence) -> bool,
    {
        let mut found: Vec<Occurrence> = self.rows.values().filter(|o| predicate(o)).cloned().collect();
        sort_occurrences(&mut found);
        found
    }
}

impl OccurrenceRepository for StagedRows<'_> {
    fn find_by_id(&self, id: OccurrenceId) -> Result<Option<Occurrence>> {
        Ok(self.rows.get(&id).cloned())
    }

    fn exists_by_id(&self, id: OccurrenceId) -> Result<bool> {
        Ok(self.rows.contains_key(&id))
    }

    fn find_occurrences_conflicting(
        &self,
        room_id: RoomId,
        date: NaiveDate,
        _start: NaiveTime,
        _end: NaiveTime,
    ) -> Result<Vec<Occurrence>> {
        Ok(self.collect_sorted(|o| o.room_id == room_id && o.date == date))
    }

    fn find_occurrences_overlapping_range(
        &self,
        room_id: RoomId,
        start_date: NaiveDate,
        end_date: NaiveDate,
        _start: NaiveTime,
        _end: NaiveTime,
        weekdays: Option<&WorkWeek>,
    ) -> Result<Vec<Occurrence>> {
        Ok(self.collect_sorted(|o| {
            o.room_id == room_id
                && o.date >= start_date
                && o.date <= end_date
                && weekdays.map_or(true, |w| w.contains(o.date.weekday()))
        }))
    }

    fn find_by_series(&self, series_id: SeriesId) -> Result<Vec<Occurrence>> {
        Ok(self.collect_sorted(|o| o.series_id == Some(series_id)))
    }

    fn search(&self, filter: &SearchFilter) -> Result<Vec<Occurrence>> {
        Ok(self.collect_sorted(|o| filter.matches(o)))
    }

    fn save(&mut self, occurrence: Occurrence) -> Result<Occurrence> {
        self.rows.to_mut().insert(occurrence.id, occurrence.clone());
        Ok(occurrence)
    }

    fn delete_by_id(&mut self, id: OccurrenceId) -> Result<bool> {
        if !self.rows.contains_key(&id) {
            return Ok(false);
        }
        Ok(self.rows.to_mut().remove(&id).is_some())
    }

    fn delete_by_series_from_date(
        &mut self,
        series_id: SeriesId,
        date: NaiveDate,
    ) -> Result<usize> {
        let doomed = |o: &Occurrence| o.series_id == Some(series_id) && o.date >= date;
        if !self.rows.values().any(doomed) {
            return Ok(0);
        }
        let rows = self.rows.to_mut();
        let before = rows.len();
        rows.retain(|_, o| !doomed(o));
        Ok(before - rows.len())
    }
}

fn sort_occurrences(occurrences: &mut [Occurrence]) {
    occurrences.sort_by(|a, b| {
        (a.date, a.start_time, &a.title, a.id).cmp(&(b.date, b.start_time, &b.title, b.id))
    });
}

/// A fixed set of rooms and users.
#[derive(Debug, Clone, Default)]
pub struct InMemoryDirectory {
    rooms: HashMap<RoomId, Room>,
    users: HashMap<UserId, User>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_room(mut self, room: Room) -> Self {
        self.rooms.insert(room.id, room);
        self
    }

    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn rooms(&self) -> impl Iterator<Item = &Room> {
        self.rooms.values()
    }

    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }
}

impl Directory for InMemoryDirectory {
    fn find_room_by_id(&self, id: RoomId) -> Result<Option<Room>> {
        Ok(self.rooms.get(&id).cloned())
    }

    fn find_user_by_id(&self, id: UserId) -> Result<Option<User>> {
        Ok(self.users.get(&id).cloned())
    }
}
