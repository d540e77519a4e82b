//! # booking-engine
//!
//! Conflict-free meeting room booking for single and recurring events.
//!
//! The engine guarantees that no two occurrences booked in the same room on
//! the same date overlap, expands `DAILY` and `WEEKLY` requests into concrete
//! occurrences, and edits a recurring series either one occurrence at a time
//! or from a given occurrence onward. Rooms, users and storage belong to the
//! surrounding service and are reached through the traits in [`store`].
//!
//! ## Quick start
//!
//! ```rust
//! use booking_engine::{
//!     AppointmentRequest, Actor, BookingPolicy, BookingService, InMemoryDirectory,
//!     InMemoryStore, Room, SystemClock, User,
//! };
//!
//! let directory = InMemoryDirectory::new()
//!     .with_room(Room { id: 1, name: "Aurora".into(), capacity: Some(8) })
//!     .with_user(User { id: 7, name: "Dana".into(), email: None });
//! let service = BookingService::new(
//!     InMemoryStore::new(),
//!     directory,
//!     SystemClock,
//!     BookingPolicy::default(),
//! );
//!
//! let request = AppointmentRequest {
//!     title: "Planning".into(),
//!     room_id: 1,
//!     date: Some("2099-03-02".into()),
//!     start_time: Some("09:00".into()),
//!     end_time: Some("10:00".into()),
//!     recurrence_pattern: "WEEKLY".into(),
//!     recurrence_end_date: Some("2099-03-31".into()),
//!     weekdays: vec!["MONDAY".into(), "WEDNESDAY".into()],
//!     ..Default::default()
//! };
//! let created = service.create_series(&Actor::new(7), &request).unwrap();
//! assert_eq!(created.len(), 9);
//! ```
//!
//! ## Modules
//!
//! - [`interval`] — single-day time intervals and the overlap predicate
//! - [`recurrence`] — `ONLY` / `DAILY` / `WEEKLY` expansion
//! - [`conflict`] — collisions against persisted occurrences
//! - [`validation`] — collect-all request validation
//! - [`series`] — create, edit, delete and search through [`BookingService`]
//! - [`store`] — collaborator traits and in-memory implementations
//! - [`settings`] — configuration loading
//! - [`error`] — error types

pub mod clock;
pub mod conflict;
pub mod error;
pub mod interval;
pub mod model;
pub mod recurrence;
pub mod search;
pub mod series;
pub mod settings;
pub mod store;
pub mod validation;

pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::{Conflict, ConflictDetector};
pub use error::{BookingError, Entity};
pub use interval::{BoundaryPolicy, TimeInterval};
pub use model::{
    Actor, AppointmentRequest, Occurrence, OccurrenceId, RecurrencePattern, Room, RoomId,
    SeriesId, User, UserId,
};
pub use recurrence::{expand, Expansion, WorkWeek};
pub use search::{Page, PageRequest, SearchFilter};
pub use series::{BookingService, DeleteReport, UpdateScope};
pub use settings::{BookingConfig, BookingPolicy};
pub use store::{Directory, InMemoryDirectory, InMemoryStore, OccurrenceRepository, OccurrenceStore};
pub use validation::{ValidRequest, ValidationErrors, Validator};
