//! `roombook` CLI: validate, expand and book meeting-room requests against a
//! local JSON state file.
//!
//! ## Usage
//!
//! ```sh
//! # Report every validation problem of a request (exit 1 if any)
//! roombook validate -i request.json
//!
//! # Preview the dates a recurring request expands to
//! roombook expand -i request.json
//!
//! # Book it as user 7, persisting into state.json
//! roombook --store state.json create --as 7 -i request.json
//!
//! # Move one occurrence, or it and everything after it
//! roombook --store state.json update --as 7 --id <UUID> --scope single -i request.json
//! roombook --store state.json update --as 7 --id <UUID> --scope future -i request.json
//!
//! # Delete occurrences
//! roombook --store state.json delete --as 7 <UUID> <UUID>
//! roombook --store state.json delete-future --as 7 --id <UUID>
//!
//! # Look up and search
//! roombook --store state.json get --id <UUID>
//! roombook --store state.json search --room 1 --page 2 --page-size 10
//! ```
//!
//! Requests are read from `-i FILE` or stdin. Results are JSON on stdout;
//! logs go to stderr and are filtered with `RUST_LOG` (default `warn`).

mod state;

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use booking_engine::series::{plan_series, Audit};
use booking_engine::{
    Actor, AppointmentRequest, BookingConfig, BookingError, BookingPolicy, FixedClock,
    PageRequest, SearchFilter, UpdateScope, User, Validator,
};
use chrono::{NaiveDate, TimeZone, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::state::{Service, StateFile};

#[derive(Parser)]
#[command(
    name = "roombook",
    version,
    about = "Meeting-room booking with recurring series and conflict checks"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Settings file (TOML or JSON); ROOMBOOK_* environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON state file holding rooms, users and occurrences
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Treat this date as today instead of the system clock
    #[arg(long, global = true)]
    today: Option<NaiveDate>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print every validation problem of a request as a JSON field map
    Validate {
        /// Request file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Show the dates a request expands to, without booking anything
    Expand {
        /// Request file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Book a request
    Create {
        /// Acting user id
        #[arg(long = "as")]
        actor: i64,
        /// Request file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Edit an occurrence, alone or together with its later siblings
    Update {
        /// Acting user id
        #[arg(long = "as")]
        actor: i64,
        #[arg(long)]
        id: Uuid,
        /// `single` (or 1) for this occurrence, `future` (or 2) for this and later ones
        #[arg(long)]
        scope: String,
        /// Request file (reads from stdin if omitted)
        #[arg(short, long)]
        input: Option<String>,
    },
    /// Delete occurrences by id
    Delete {
        /// Acting user id
        #[arg(long = "as")]
        actor: i64,
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
    /// Delete an occurrence and every later occurrence of its series
    DeleteFuture {
        /// Acting user id
        #[arg(long = "as")]
        actor: i64,
        #[arg(long)]
        id: Uuid,
    },
    /// Print one occurrence
    Get {
        #[arg(long)]
        id: Uuid,
    },
    /// Search occurrences, one page at a time
    Search {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        room: Option<i64>,
        #[arg(long)]
        user: Option<i64>,
        #[arg(long, default_value_t = 1)]
        page: usize,
        /// 0 selects the configured default
        #[arg(long, default_value_t = 0)]
        page_size: usize,
    },
}

impl Commands {
    fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Create { .. }
                | Commands::Update { .. }
                | Commands::Delete { .. }
                | Commands::DeleteFuture { .. }
        )
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExpandOutput {
    pattern: String,
    rrule: Option<String>,
    dates: Vec<NaiveDate>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let policy = BookingConfig::load(cli.config.as_deref())
        .and_then(|config| config.policy())
        .context("Failed to load settings")?;
    let clock = clock_for(cli.today, &policy)?;

    if cli.command.mutates() && cli.store.is_none() {
        anyhow::bail!("This command needs --store FILE");
    }
    let state = match cli.store.as_deref() {
        Some(path) => {
            let state = StateFile::load(path)?;
            tracing::debug!(
                path = %path.display(),
                rooms = state.rooms.len(),
                users = state.users.len(),
                occurrences = state.occurrences.len(),
                "loaded state file"
            );
            state
        }
        None => StateFile::default(),
    };
    let service = state.into_service(clock, policy);

    match cli.command {
        Commands::Validate { input } => {
            let request = read_request(input.as_deref())?;
            let errors = service.validate(&request)?;
            print_json(&errors)?;
            return Ok(if errors.is_empty() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            });
        }
        Commands::Expand { input } => {
            let request = read_request(input.as_deref())?;
            let policy = service.policy();
            let now = clock.0;
            let valid = match Validator::new(policy, policy.today(now)).check(&request, None) {
                Ok(valid) => valid,
                Err(err) => return report(err),
            };
            // Preview only; nothing is stored, so the audit user is a placeholder.
            let preview = User {
                id: 0,
                name: String::new(),
                email: None,
            };
            let expansion = plan_series(&valid, &Audit::created(&preview, now))?;
            print_json(&ExpandOutput {
                pattern: expansion.pattern().to_string(),
                rrule: expansion.to_rrule(),
                dates: expansion.dates().collect(),
            })?;
        }
        Commands::Create { actor, input } => {
            let request = read_request(input.as_deref())?;
            match service.create_series(&Actor::new(actor), &request) {
                Ok(created) => print_json(&created)?,
                Err(err) => return report(err),
            }
            persist(cli.store.as_deref(), &service)?;
        }
        Commands::Update {
            actor,
            id,
            scope,
            input,
        } => {
            let scope: UpdateScope = scope.parse()?;
            let request = read_request(input.as_deref())?;
            match service.update_occurrence(&Actor::new(actor), id, &request, scope) {
                Ok(updated) => print_json(&updated)?,
                Err(err) => return report(err),
            }
            persist(cli.store.as_deref(), &service)?;
        }
        Commands::Delete { actor, ids } => {
            let report = service.delete_occurrences(&Actor::new(actor), &ids)?;
            print_json(&report)?;
            persist(cli.store.as_deref(), &service)?;
            if !report.is_complete() {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::DeleteFuture { actor, id } => {
            let removed = service.delete_future_occurrences(&Actor::new(actor), id)?;
            print_json(&serde_json::json!({ "removed": removed }))?;
            persist(cli.store.as_deref(), &service)?;
        }
        Commands::Get { id } => {
            print_json(&service.get_occurrence(id)?)?;
        }
        Commands::Search {
            title,
            room,
            user,
            page,
            page_size,
        } => {
            let filter = SearchFilter {
                title,
                room_id: room,
                user_id: user,
            };
            let page = service.search_occurrences(
                &filter,
                PageRequest {
                    page_no: page,
                    page_size,
                },
            )?;
            print_json(&page)?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// A clock pinned to `today` at local noon, or to the current instant.
fn clock_for(today: Option<NaiveDate>, policy: &BookingPolicy) -> Result<FixedClock> {
    let Some(today) = today else {
        return Ok(FixedClock(Utc::now()));
    };
    let noon = today
        .and_hms_opt(12, 0, 0)
        .with_context(|| format!("Invalid date: {}", today))?;
    let local = policy
        .timezone
        .from_local_datetime(&noon)
        .earliest()
        .with_context(|| format!("No local noon on {} in {}", today, policy.timezone))?;
    Ok(FixedClock(local.with_timezone(&Utc)))
}

/// Print a rejected request as JSON on stdout and fail. Errors that are not
/// about the request itself propagate to stderr instead.
fn report(err: BookingError) -> Result<ExitCode> {
    match err {
        BookingError::Validation(errors) => {
            print_json(&serde_json::json!({ "errors": errors }))?;
        }
        BookingError::Conflict(conflicts) => {
            print_json(&serde_json::json!({ "conflicts": conflicts }))?;
        }
        other => return Err(other.into()),
    }
    Ok(ExitCode::FAILURE)
}

fn persist(path: Option<&Path>, service: &Service) -> Result<()> {
    let path = path.context("This command needs --store FILE")?;
    let state = StateFile::from_service(service)?;
    state.save(path)?;
    tracing::debug!(
        path = %path.display(),
        occurrences = state.occurrences.len(),
        "saved state file"
    );
    Ok(())
}

fn read_request(path: Option<&str>) -> Result<AppointmentRequest> {
    let raw = read_input(path)?;
    serde_json::from_str(&raw).context("Failed to parse request JSON")
}

fn read_input(path: Option<&str>) -> Result<String> {
    match path {
        Some(path) => {
            std::fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path))
        }
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read from stdin")?;
            Ok(buf)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
