//! The JSON state file standing in for the directory and storage services.
//!
//! ```json
//! { "rooms": [...], "users": [...], "occurrences": [...] }
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use booking_engine::{
    BookingPolicy, BookingService, FixedClock, InMemoryDirectory, InMemoryStore, Occurrence,
    Room, User,
};
use serde::{Deserialize, Serialize};

pub type Service = BookingService<InMemoryStore, InMemoryDirectory, FixedClock>;

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct StateFile {
    #[serde(default)]
    pub rooms: Vec<Room>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub occurrences: Vec<Occurrence>,
}

impl StateFile {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid state file: {}", path.display()))
    }

    pub fn into_service(self, clock: FixedClock, policy: BookingPolicy) -> Service {
        let directory = self
            .rooms
            .into_iter()
            .fold(InMemoryDirectory::new(), InMemoryDirectory::with_room);
        let directory = self
            .users
            .into_iter()
            .fold(directory, InMemoryDirectory::with_user);
        let store = InMemoryStore::with_occurrences(self.occurrences);
        BookingService::new(store, directory, clock, policy)
    }

    /// Capture the service's current rooms, users and occurrences.
    pub fn from_service(service: &Service) -> Result<Self> {
        let mut rooms: Vec<Room> = service.directory().rooms().cloned().collect();
        rooms.sort_by_key(|r| r.id);
        let mut users: Vec<User> = service.directory().users().cloned().collect();
        users.sort_by_key(|u| u.id);
        let occurrences = service.store().snapshot()?;
        Ok(Self {
            rooms,
            users,
            occurrences,
        })
    }

    /// Write atomically: a sibling temp file renamed over the target.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write file: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file: {}", path.display()))?;
        Ok(())
    }
}
