//! Error types for booking-engine operations.

use thiserror::Error;

use crate::conflict::Conflict;
use crate::validation::ValidationErrors;

/// The kind of record a [`BookingError::NotFound`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Occurrence,
    Room,
    User,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Entity::Occurrence => "occurrence",
            Entity::Room => "room",
            Entity::User => "user",
        })
    }
}

#[derive(Error, Debug)]
pub enum BookingError {
    /// One or more request fields failed validation. Every applicable rule has
    /// already run, so the map holds all problems at once.
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The request collides with at least one persisted occurrence.
    #[error("Booking conflict on {}", conflict_dates(.0))]
    Conflict(Vec<Conflict>),

    #[error("No {entity} with id {id}")]
    NotFound { entity: Entity, id: String },

    #[error("Invalid update selection: {0}")]
    InvalidSelection(String),

    #[error("Invalid time interval: {0}")]
    InvalidInterval(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A collaborator (storage, directory) failed unexpectedly.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BookingError {
    pub fn not_found(entity: Entity, id: impl ToString) -> Self {
        BookingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Validation and conflict failures are rendered to the user as field
    /// errors; everything else is a typed failure the caller maps itself.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, BookingError::Validation(_) | BookingError::Conflict(_))
    }
}

impl From<ValidationErrors> for BookingError {
    fn from(errors: ValidationErrors) -> Self {
        BookingError::Validation(errors)
    }
}

impl From<config::ConfigError> for BookingError {
    fn from(err: config::ConfigError) -> Self {
        BookingError::Config(err.to_string())
    }
}

/// Distinct dates of `conflicts`, comma separated.
pub(crate) fn conflict_dates(conflicts: &[Conflict]) -> String {
    let mut dates: Vec<String> = conflicts
        .iter()
        .map(|c| c.requested.date.to_string())
        .collect();
    dates.dedup();
    dates.join(", ")
}

pub type Result<T> = std::result::Result<T, BookingError>;
