//! Detect collisions between requested intervals and persisted occurrences.
//!
//! Storage is asked for same-room candidates; the overlap predicate is always
//! applied here, never delegated. Whether touching intervals collide follows
//! the configured [`BoundaryPolicy`].

use std::collections::HashMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::error::Result;
use crate::interval::{BoundaryPolicy, TimeInterval};
use crate::model::{Occurrence, OccurrenceId, RoomId};
use crate::recurrence::WorkWeek;
use crate::store::OccurrenceRepository;

/// A requested interval that collides with a persisted occurrence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub requested: TimeInterval,
    pub existing: Occurrence,
    pub overlap_minutes: i64,
}

/// Conflict queries against one repository view.
pub struct ConflictDetector<'r> {
    repo: &'r dyn OccurrenceRepository,
    boundary: BoundaryPolicy,
    excluded: Vec<OccurrenceId>,
}

impl<'r> ConflictDetector<'r> {
    pub fn new(repo: &'r dyn OccurrenceRepository, boundary: BoundaryPolicy) -> Self {
        Self {
            repo,
            boundary,
            excluded: Vec::new(),
        }
    }

    /// Ignore one occurrence, e.g. the one being edited.
    pub fn excluding(mut self, id: OccurrenceId) -> Self {
        self.excluded.push(id);
        self
    }

    pub fn boundary(&self) -> BoundaryPolicy {
        self.boundary
    }

    pub fn has_conflict(&self, room_id: RoomId, requested: &TimeInterval) -> Result<bool> {
        Ok(!self.conflicts(room_id, requested)?.is_empty())
    }

    /// Every persisted occurrence in `room_id` colliding with `requested`.
    pub fn conflicts(&self, room_id: RoomId, requested: &TimeInterval) -> Result<Vec<Conflict>> {
        let candidates = self.repo.find_occurrences_conflicting(
            room_id,
            requested.date,
            requested.start,
            requested.end,
        )?;
        Ok(candidates
            .into_iter()
            .filter_map(|existing| self.collide(room_id, requested, existing))
            .collect())
    }

    /// Collisions for a whole batch of requested occurrences in one room.
    ///
    /// Issues a single range query covering the batch and checks each
    /// requested occurrence against the candidates on its date.
    pub fn batch_conflicts(
        &self,
        room_id: RoomId,
        requested: &[Occurrence],
    ) -> Result<Vec<Conflict>> {
        let (Some(first), Some(last)) = (
            requested.iter().map(|o| o.date).min(),
            requested.iter().map(|o| o.date).max(),
        ) else {
            return Ok(Vec::new());
        };
        let (start, end) = requested.iter().fold(
            (requested[0].start_time, requested[0].end_time),
            |(start, end), o| (start.min(o.start_time), end.max(o.end_time)),
        );
        let weekdays = working_days_of(requested);

        let candidates = self.repo.find_occurrences_overlapping_range(
            room_id,
            first,
            last,
            start,
            end,
            weekdays.as_ref(),
        )?;

        let mut by_date: HashMap<NaiveDate, Vec<Occurrence>> = HashMap::new();
        for candidate in candidates {
            by_date.entry(candidate.date).or_default().push(candidate);
        }

        let mut conflicts = Vec::new();
        for occurrence in requested {
            let interval = occurrence.interval();
            let Some(on_date) = by_date.get(&occurrence.date) else {
                continue;
            };
            conflicts.extend(
                on_date
                    .iter()
                    .filter(|existing| existing.id != occurrence.id)
                    .filter_map(|existing| self.collide(room_id, &interval, existing.clone())),
            );
        }
        Ok(conflicts)
    }

    fn collide(
        &self,
        room_id: RoomId,
        requested: &TimeInterval,
        existing: Occurrence,
    ) -> Option<Conflict> {
        if existing.room_id != room_id || self.excluded.contains(&existing.id) {
            return None;
        }
        let existing_interval = existing.interval();
        if !requested.overlaps(&existing_interval, self.boundary) {
            return None;
        }
        Some(Conflict {
            requested: *requested,
            overlap_minutes: requested.overlap_minutes(&existing_interval),
            existing,
        })
    }
}

/// The weekday filter for a batch, or `None` when the batch touches a
/// weekend and so cannot be described by a working-day set.
fn working_days_of(occurrences: &[Occurrence]) -> Option<WorkWeek> {
    let mut week = WorkWeek::new();
    for occurrence in occurrences {
        week.insert(occurrence.date.weekday()).ok()?;
    }
    Some(week)
}
