//! Series-aware booking operations: create, edit one occurrence, edit this
//! and all future occurrences, delete, look up and search.
//!
//! Each mutating call follows the same path. The acting user, room and
//! attendees are resolved through the [`Directory`]; then validation,
//! expansion, conflict screening and the writes all run inside a single
//! [`OccurrenceStore::transaction`]. Any failure inside that closure leaves
//! storage exactly as it was, so a series is never partially written.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::conflict::ConflictDetector;
use crate::error::{conflict_dates, BookingError, Entity, Result};
use crate::model::{
    Actor, AppointmentRequest, Occurrence, OccurrenceId, RecurrencePattern, SeriesId, User, UserId,
};
use crate::recurrence::{self, Expansion};
use crate::search::{Page, PageRequest, SearchFilter};
use crate::settings::BookingPolicy;
use crate::store::{Directory, OccurrenceRepository, OccurrenceStore};
use crate::validation::{ValidRequest, ValidationErrors, Validator};

/// Which occurrences an edit applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpdateScope {
    /// Only the addressed occurrence (selection `1`).
    ThisOccurrence,
    /// The addressed occurrence and every later one in its series (selection `2`).
    ThisAndFuture,
}

impl TryFrom<u8> for UpdateScope {
    type Error = BookingError;

    fn try_from(selection: u8) -> Result<Self> {
        match selection {
            1 => Ok(UpdateScope::ThisOccurrence),
            2 => Ok(UpdateScope::ThisAndFuture),
            other => Err(BookingError::InvalidSelection(other.to_string())),
        }
    }
}

impl FromStr for UpdateScope {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "single" | "this" | "this-occurrence" => Ok(UpdateScope::ThisOccurrence),
            "2" | "future" | "this-and-future" => Ok(UpdateScope::ThisAndFuture),
            _ => Err(BookingError::InvalidSelection(s.to_string())),
        }
    }
}

/// Outcome of a batch delete: ids are reported individually.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteReport {
    pub deleted: Vec<OccurrenceId>,
    pub not_found: Vec<OccurrenceId>,
}

impl DeleteReport {
    pub fn is_complete(&self) -> bool {
        self.not_found.is_empty()
    }

    /// One `NotFound` error per id that could not be deleted.
    pub fn errors(&self) -> Vec<BookingError> {
        self.not_found
            .iter()
            .map(|id| BookingError::not_found(Entity::Occurrence, id))
            .collect()
    }
}

/// Audit fields stamped onto written occurrences.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Audit {
    pub created_at: DateTime<Utc>,
    pub creator_id: UserId,
    pub creator_name: String,
    pub updated_at: DateTime<Utc>,
    pub updator_id: UserId,
    pub updator_name: String,
}

impl Audit {
    /// A brand-new record created by `user`.
    pub fn created(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            created_at: now,
            creator_id: user.id,
            creator_name: user.name.clone(),
            updated_at: now,
            updator_id: user.id,
            updator_name: user.name.clone(),
        }
    }

    /// An edit by `user` of a record originally created as `original`.
    pub fn edited(original: &Occurrence, user: &User, now: DateTime<Utc>) -> Self {
        Self {
            created_at: original.created_at,
            creator_id: original.creator_id,
            creator_name: original.creator_name.clone(),
            updated_at: now,
            updator_id: user.id,
            updator_name: user.name.clone(),
        }
    }
}

/// Map a validated request onto an occurrence record.
///
/// Every field is listed; the date comes from the request and the id is fresh.
pub fn base_occurrence(
    valid: &ValidRequest,
    series_id: Option<SeriesId>,
    audit: &Audit,
) -> Occurrence {
    Occurrence {
        id: Uuid::new_v4(),
        series_id,
        title: valid.title.clone(),
        content_brief: valid.content_brief.clone(),
        room_id: valid.room_id,
        date: valid.interval.date,
        start_time: valid.interval.start,
        end_time: valid.interval.end,
        recurrence_pattern: valid.pattern,
        recurrence_end_date: valid.recurrence_end_date,
        attendee_ids: valid.attendee_ids.clone(),
        created_at: audit.created_at,
        updated_at: audit.updated_at,
        creator_id: audit.creator_id,
        creator_name: audit.creator_name.clone(),
        updator_id: audit.updator_id,
        updator_name: audit.updator_name.clone(),
    }
}

/// Expand a validated request into its occurrences.
///
/// Recurring requests get a fresh series id; single bookings get none.
pub fn plan_series(valid: &ValidRequest, audit: &Audit) -> Result<Expansion> {
    let series_id = valid.pattern.is_recurring().then(Uuid::new_v4);
    let base = base_occurrence(valid, series_id, audit);
    recurrence::expand(
        &base,
        valid.pattern,
        valid.recurrence_end_date,
        Some(valid.weekdays.as_slice()),
    )
}

/// The booking core, wired to its collaborators.
pub struct BookingService<S, D, C> {
    store: S,
    directory: D,
    clock: C,
    policy: BookingPolicy,
}

impl<S, D, C> BookingService<S, D, C>
where
    S: OccurrenceStore,
    D: Directory,
    C: Clock,
{
    pub fn new(store: S, directory: D, clock: C, policy: BookingPolicy) -> Self {
        Self {
            store,
            directory,
            clock,
            policy,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn directory(&self) -> &D {
        &self.directory
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    /// Every validation problem with `request`, including a conflict of its
    /// first occurrence. Writes nothing.
    pub fn validate(&self, request: &AppointmentRequest) -> Result<ValidationErrors> {
        let today = self.policy.today(self.clock.now());
        self.store.transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, self.policy.boundary);
            Validator::new(&self.policy, today).validate(request, Some(&detector))
        })
    }

    /// Book `request` for `actor`. Returns every created occurrence in date
    /// order; the first one is the base occurrence.
    ///
    /// # Errors
    /// `NotFound` for an unknown actor, room or attendee; `Validation` for a
    /// malformed request or a clash of its first occurrence; `Conflict` when
    /// any later occurrence clashes. Nothing is written on error.
    pub fn create_series(
        &self,
        actor: &Actor,
        request: &AppointmentRequest,
    ) -> Result<Vec<Occurrence>> {
        let user = self.resolve_participants(actor, request)?;
        let now = self.clock.now();
        let validator = Validator::new(&self.policy, self.policy.today(now));

        let created = self.store.transaction(|repo| {
            let mut valid = {
                let detector = ConflictDetector::new(&*repo, self.policy.boundary);
                validator.check(request, Some(&detector))?
            };
            valid.attendee_ids.insert(actor.id);
            let expansion = plan_series(&valid, &Audit::created(&user, now))?;
            self.write_batch(repo, &valid, &expansion)
        });

        match &created {
            Ok(occurrences) => tracing::info!(
                actor = actor.id,
                room_id = request.room_id,
                series_id = ?occurrences.first().and_then(|o| o.series_id),
                count = occurrences.len(),
                "created booking"
            ),
            Err(err) => log_rejection(actor, "create", err),
        }
        created
    }

    /// Edit an existing occurrence.
    ///
    /// With [`UpdateScope::ThisOccurrence`] the occurrence is rewritten in
    /// place and detached from its series. With [`UpdateScope::ThisAndFuture`]
    /// it and every later occurrence of its series are replaced by the
    /// expansion of `request`, which becomes a new series; earlier occurrences
    /// are left untouched.
    pub fn update_occurrence(
        &self,
        actor: &Actor,
        id: OccurrenceId,
        request: &AppointmentRequest,
        scope: UpdateScope,
    ) -> Result<Vec<Occurrence>> {
        let user = self.resolve_participants(actor, request)?;
        let now = self.clock.now();
        let validator = Validator::new(&self.policy, self.policy.today(now));

        let updated = self.store.transaction(|repo| {
            let target = repo
                .find_by_id(id)?
                .ok_or_else(|| BookingError::not_found(Entity::Occurrence, id))?;
            let audit = Audit::edited(&target, &user, now);

            match scope {
                UpdateScope::ThisOccurrence => {
                    let mut valid = {
                        let detector =
                            ConflictDetector::new(&*repo, self.policy.boundary).excluding(id);
                        validator.check(request, Some(&detector))?
                    };
                    valid.attendee_ids.insert(actor.id);
                    let mut edited = base_occurrence(&valid, None, &audit);
                    edited.id = target.id;
                    edited.recurrence_pattern = RecurrencePattern::Only;
                    edited.recurrence_end_date = None;
                    Ok(vec![repo.save(edited)?])
                }
                UpdateScope::ThisAndFuture => {
                    let removed = match target.series_id {
                        Some(series_id) => repo.delete_by_series_from_date(series_id, target.date)?,
                        None => usize::from(repo.delete_by_id(target.id)?),
                    };
                    tracing::debug!(removed, occurrence_id = %id, "cleared future occurrences");

                    let mut valid = {
                        let detector = ConflictDetector::new(&*repo, self.policy.boundary);
                        validator.check(request, Some(&detector))?
                    };
                    valid.attendee_ids.insert(actor.id);
                    let expansion = plan_series(&valid, &audit)?;
                    self.write_batch(repo, &valid, &expansion)
                }
            }
        });

        match &updated {
            Ok(occurrences) => tracing::info!(
                actor = actor.id,
                occurrence_id = %id,
                ?scope,
                count = occurrences.len(),
                "updated booking"
            ),
            Err(err) => log_rejection(actor, "update", err),
        }
        updated
    }

    /// Delete one occurrence. Its series siblings are not touched.
    pub fn delete_occurrence(&self, actor: &Actor, id: OccurrenceId) -> Result<()> {
        self.store.transaction(|repo| {
            if repo.delete_by_id(id)? {
                Ok(())
            } else {
                Err(BookingError::not_found(Entity::Occurrence, id))
            }
        })?;
        tracing::info!(actor = actor.id, occurrence_id = %id, "deleted occurrence");
        Ok(())
    }

    /// Delete several occurrences. Unknown ids are reported in the result and
    /// do not stop the others from being deleted.
    pub fn delete_occurrences(&self, actor: &Actor, ids: &[OccurrenceId]) -> Result<DeleteReport> {
        let report = self.store.transaction(|repo| {
            let mut report = DeleteReport::default();
            for &id in ids {
                if repo.delete_by_id(id)? {
                    report.deleted.push(id);
                } else {
                    report.not_found.push(id);
                }
            }
            Ok(report)
        })?;
        tracing::info!(
            actor = actor.id,
            deleted = report.deleted.len(),
            not_found = report.not_found.len(),
            "deleted occurrences"
        );
        Ok(report)
    }

    /// Delete an occurrence and every later occurrence of its series.
    /// Returns how many occurrences were removed.
    pub fn delete_future_occurrences(&self, actor: &Actor, id: OccurrenceId) -> Result<usize> {
        let removed = self.store.transaction(|repo| {
            let target = repo
                .find_by_id(id)?
                .ok_or_else(|| BookingError::not_found(Entity::Occurrence, id))?;
            match target.series_id {
                Some(series_id) => repo.delete_by_series_from_date(series_id, target.date),
                None => Ok(usize::from(repo.delete_by_id(target.id)?)),
            }
        })?;
        tracing::info!(actor = actor.id, occurrence_id = %id, removed, "deleted future occurrences");
        Ok(removed)
    }

    pub fn get_occurrence(&self, id: OccurrenceId) -> Result<Occurrence> {
        self.store.transaction(|repo| {
            repo.find_by_id(id)?
                .ok_or_else(|| BookingError::not_found(Entity::Occurrence, id))
        })
    }

    /// Every occurrence of a series in date order; empty for an unknown series.
    pub fn series_occurrences(&self, series_id: SeriesId) -> Result<Vec<Occurrence>> {
        self.store.transaction(|repo| repo.find_by_series(series_id))
    }

    pub fn search_occurrences(
        &self,
        filter: &SearchFilter,
        page: PageRequest,
    ) -> Result<Page<Occurrence>> {
        let all = self.store.transaction(|repo| repo.search(filter))?;
        Ok(Page::slice(
            all,
            page.page_no,
            self.policy.page_size(page.page_size),
        ))
    }

    /// Look up the actor, the room and every attendee; the actor is returned
    /// for audit stamping.
    fn resolve_participants(&self, actor: &Actor, request: &AppointmentRequest) -> Result<User> {
        let user = self
            .directory
            .find_user_by_id(actor.id)?
            .ok_or_else(|| BookingError::not_found(Entity::User, actor.id))?;
        self.directory
            .find_room_by_id(request.room_id)?
            .ok_or_else(|| BookingError::not_found(Entity::Room, request.room_id))?;
        for &attendee in &request.attendee_ids {
            if attendee != actor.id && self.directory.find_user_by_id(attendee)?.is_none() {
                return Err(BookingError::not_found(Entity::User, attendee));
            }
        }
        Ok(user)
    }

    /// Screen an expanded batch and persist it, or fail without writing.
    fn write_batch(
        &self,
        repo: &mut dyn OccurrenceRepository,
        valid: &ValidRequest,
        expansion: &Expansion,
    ) -> Result<Vec<Occurrence>> {
        let batch: Vec<Occurrence> = expansion.occurrences().collect();
        tracing::debug!(
            pattern = %expansion.pattern(),
            count = batch.len(),
            first = %expansion.first_date(),
            last = %expansion.last_date(),
            "expanded booking"
        );
        let conflicts = ConflictDetector::new(&*repo, self.policy.boundary)
            .batch_conflicts(valid.room_id, &batch)?;
        if !conflicts.is_empty() {
            return Err(BookingError::Conflict(conflicts));
        }
        repo.save_all(batch)
    }
}

fn log_rejection(actor: &Actor, operation: &str, err: &BookingError) {
    match err {
        BookingError::Conflict(conflicts) => tracing::warn!(
            actor = actor.id,
            operation,
            conflicts = conflicts.len(),
            dates = %conflict_dates(conflicts),
            "booking rejected: room already booked"
        ),
        BookingError::Validation(errors) => tracing::debug!(
            actor = actor.id,
            operation,
            %errors,
            "booking rejected: invalid request"
        ),
        other => tracing::debug!(actor = actor.id, operation, error = %other, "booking failed"),
    }
}
