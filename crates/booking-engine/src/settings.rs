//! Engine configuration.
//!
//! [`BookingConfig`] is the raw, deserializable form: an optional TOML or JSON
//! file layered under `ROOMBOOK_*` environment variables. [`BookingPolicy`]
//! is the resolved form the engine runs with.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::error::{BookingError, Result};
use crate::interval::BoundaryPolicy;

pub const ENV_PREFIX: &str = "ROOMBOOK";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    /// IANA zone whose calendar decides what "today" is.
    pub timezone: String,
    pub boundary: BoundaryPolicy,
    /// Longest allowed distance between a series' first and last date.
    pub max_series_days: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            boundary: BoundaryPolicy::default(),
            max_series_days: 366,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl BookingConfig {
    /// Load from an optional file, then apply `ROOMBOOK_*` overrides
    /// (e.g. `ROOMBOOK_TIMEZONE=Europe/Berlin`).
    ///
    /// The file format follows its extension (`.toml`, `.json`).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path));
        }
        let config = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;
        Ok(config)
    }

    pub fn policy(&self) -> Result<BookingPolicy> {
        let timezone: Tz = self
            .timezone
            .parse()
            .map_err(|_| BookingError::Config(format!("unknown timezone '{}'", self.timezone)))?;
        if self.max_series_days == 0 {
            return Err(BookingError::Config(
                "max_series_days must be at least 1".to_string(),
            ));
        }
        if self.default_page_size == 0 || self.max_page_size == 0 {
            return Err(BookingError::Config(
                "page sizes must be at least 1".to_string(),
            ));
        }
        Ok(BookingPolicy {
            timezone,
            boundary: self.boundary,
            max_series_days: self.max_series_days,
            default_page_size: self.default_page_size.min(self.max_page_size),
            max_page_size: self.max_page_size,
        })
    }
}

/// Resolved configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BookingPolicy {
    pub timezone: Tz,
    pub boundary: BoundaryPolicy,
    pub max_series_days: u32,
    pub default_page_size: usize,
    pub max_page_size: usize,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            boundary: BoundaryPolicy::default(),
            max_series_days: 366,
            default_page_size: 20,
            max_page_size: 100,
        }
    }
}

impl BookingPolicy {
    /// The calendar date of `now` in the configured zone.
    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Page size to use for a request: 0 means the default, and anything
    /// above the maximum is clamped. Never 0, even for a hand-built policy.
    pub fn page_size(&self, requested: usize) -> usize {
        let size = match requested {
            0 => self.default_page_size,
            n => n.min(self.max_page_size),
        };
        size.max(1)
    }
}
