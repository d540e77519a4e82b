//! Tests for collect-all request validation.

use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use booking_engine::validation::field;
use booking_engine::{
    AppointmentRequest, BookingError, BookingPolicy, BoundaryPolicy, ConflictDetector,
    InMemoryStore, Occurrence, OccurrenceStore, RecurrencePattern, ValidationErrors, Validator,
};

// ── Helpers ─────────────────────────────────────────────────────────────────

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn request(pattern: &str) -> AppointmentRequest {
    AppointmentRequest {
        title: "Retro".to_string(),
        room_id: 1,
        date: Some("2024-01-08".to_string()),
        start_time: Some("14:00".to_string()),
        end_time: Some("15:00".to_string()),
        recurrence_pattern: pattern.to_string(),
        recurrence_end_date: Some("2024-01-31".to_string()),
        weekdays: vec!["MONDAY".to_string()],
        ..Default::default()
    }
}

fn validate(req: &AppointmentRequest) -> ValidationErrors {
    let policy = BookingPolicy::default();
    Validator::new(&policy, today()).validate(req, None).unwrap()
}

fn messages<'a>(errors: &'a ValidationErrors, name: &str) -> &'a [String] {
    errors.get(name).unwrap_or_default()
}

fn existing(on: &str, start: &str, end: &str) -> Occurrence {
    let stamp = Utc.with_ymd_and_hms(2023, 12, 1, 0, 0, 0).unwrap();
    Occurrence {
        id: Uuid::new_v4(),
        series_id: None,
        title: "Existing".to_string(),
        content_brief: String::new(),
        room_id: 1,
        date: NaiveDate::parse_from_str(on, "%Y-%m-%d").unwrap(),
        start_time: NaiveTime::parse_from_str(start, "%H:%M").unwrap(),
        end_time: NaiveTime::parse_from_str(end, "%H:%M").unwrap(),
        recurrence_pattern: RecurrencePattern::Only,
        recurrence_end_date: None,
        attendee_ids: BTreeSet::new(),
        created_at: stamp,
        updated_at: stamp,
        creator_id: 9,
        creator_name: "Grace".to_string(),
        updator_id: 9,
        updator_name: "Grace".to_string(),
    }
}

// ── Clean requests ──────────────────────────────────────────────────────────

#[test]
fn clean_requests_have_no_errors() {
    for pattern in ["ONLY", "daily", "Weekly"] {
        let errors = validate(&request(pattern));
        assert!(errors.is_empty(), "{pattern}: {errors}");
    }
}

#[test]
fn check_returns_typed_values() {
    let policy = BookingPolicy::default();
    let valid = Validator::new(&policy, today())
        .check(&request("WEEKLY"), None)
        .unwrap();
    assert_eq!(valid.pattern, RecurrencePattern::Weekly);
    assert_eq!(valid.interval.date, today() + chrono::Duration::days(7));
    assert_eq!(valid.weekdays, vec![chrono::Weekday::Mon]);
    assert_eq!(
        valid.recurrence_end_date,
        NaiveDate::from_ymd_opt(2024, 1, 31)
    );
}

#[test]
fn only_ignores_end_date_and_weekdays() {
    let mut req = request("ONLY");
    req.recurrence_end_date = Some("garbage".to_string());
    req.weekdays = vec!["SUNDAY".to_string()];
    assert!(validate(&req).is_empty());
}

#[test]
fn date_equal_to_today_is_allowed() {
    let mut req = request("ONLY");
    req.date = Some("2024-01-01".to_string());
    assert!(validate(&req).is_empty());
}

// ── Rule 1: pattern short-circuits ──────────────────────────────────────────

#[test]
fn unknown_pattern_reports_only_the_pattern() {
    let req = AppointmentRequest {
        recurrence_pattern: "MONTHLY".to_string(),
        date: None,
        start_time: Some("nonsense".to_string()),
        ..Default::default()
    };
    let errors = validate(&req);
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec![field::RECURRENCE_PATTERN]);
}

// ── Rules 2-5: parsing collects everything ──────────────────────────────────

#[test]
fn all_parse_failures_are_reported_together() {
    let req = AppointmentRequest {
        recurrence_pattern: "DAILY".to_string(),
        date: Some("2024-02-30".to_string()),
        recurrence_end_date: None,
        start_time: Some("25:00".to_string()),
        end_time: None,
        ..Default::default()
    };
    let errors = validate(&req);
    assert_eq!(
        errors.fields().collect::<Vec<_>>(),
        vec![
            field::DATE,
            field::END_TIME,
            field::RECURRENCE_END_DATE,
            field::START_TIME,
        ]
    );
    assert_eq!(messages(&errors, field::END_TIME), ["is required"]);
    assert_eq!(messages(&errors, field::RECURRENCE_END_DATE), ["is required"]);
}

#[test]
fn past_dates_are_rejected() {
    let mut req = request("DAILY");
    req.date = Some("2023-12-30".to_string());
    req.recurrence_end_date = Some("2023-12-31".to_string());
    let errors = validate(&req);
    assert_eq!(messages(&errors, field::DATE), ["must not be in the past"]);
    assert_eq!(
        messages(&errors, field::RECURRENCE_END_DATE),
        ["must not be in the past"]
    );
}

#[test]
fn past_date_does_not_hide_ordering_errors() {
    let mut req = request("ONLY");
    req.date = Some("2023-12-30".to_string());
    req.start_time = Some("16:00".to_string());
    req.end_time = Some("15:00".to_string());
    let errors = validate(&req);
    assert_eq!(messages(&errors, field::DATE), ["must not be in the past"]);
    assert_eq!(messages(&errors, field::END_TIME), ["must not be before startTime"]);
}

#[test]
fn parse_failure_skips_ordering_rules() {
    let mut req = request("WEEKLY");
    req.start_time = Some("noon".to_string());
    req.end_time = Some("10:00".to_string());
    req.weekdays = vec!["SATURDAY".to_string()];
    let errors = validate(&req);
    assert!(errors.contains(field::START_TIME));
    assert!(!errors.contains(field::WEEKDAYS), "rule 7 runs after parsing succeeds");
}

// ── Rules 6-8: semantic checks collect everything ───────────────────────────

#[test]
fn semantic_violations_are_reported_together() {
    let mut req = request("WEEKLY");
    req.start_time = Some("16:00".to_string());
    req.end_time = Some("15:00".to_string());
    req.recurrence_end_date = Some("2024-01-05".to_string());
    req.weekdays = vec!["MONDAY".to_string(), "SATURDAY".to_string(), "Caturday".to_string()];

    let errors = validate(&req);
    assert_eq!(messages(&errors, field::END_TIME), ["must not be before startTime"]);
    assert_eq!(
        messages(&errors, field::RECURRENCE_END_DATE),
        ["must not be before date"],
        "rule 3 and rule 8 report the ordering once"
    );
    assert_eq!(messages(&errors, field::WEEKDAYS).len(), 2);
}

#[test]
fn weekly_requires_weekdays() {
    let mut req = request("WEEKLY");
    req.weekdays.clear();
    let errors = validate(&req);
    assert_eq!(
        messages(&errors, field::WEEKDAYS),
        ["at least one weekday is required for WEEKLY"]
    );
}

#[test]
fn weekly_selecting_no_date_in_range_is_rejected() {
    let mut req = request("WEEKLY");
    // Monday 8th to Tuesday 9th, Fridays only.
    req.recurrence_end_date = Some("2024-01-09".to_string());
    req.weekdays = vec!["FRIDAY".to_string()];
    let errors = validate(&req);
    assert!(errors.contains(field::WEEKDAYS));
}

#[test]
fn zero_length_interval_is_valid() {
    let mut req = request("ONLY");
    req.end_time = req.start_time.clone();
    assert!(validate(&req).is_empty());
}

#[test]
fn series_longer_than_policy_is_rejected() {
    let policy = BookingPolicy {
        max_series_days: 10,
        ..BookingPolicy::default()
    };
    let errors = Validator::new(&policy, today())
        .validate(&request("DAILY"), None)
        .unwrap();
    assert_eq!(
        messages(&errors, field::RECURRENCE_END_DATE),
        ["must be within 10 days of date"]
    );
}

// ── Rule 9: conflict of the base occurrence ─────────────────────────────────

#[test]
fn conflict_is_reported_under_date() {
    let store = InMemoryStore::with_occurrences(vec![existing("2024-01-08", "14:30", "16:00")]);
    let policy = BookingPolicy::default();
    let errors = store
        .transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, BoundaryPolicy::Inclusive);
            Validator::new(&policy, today()).validate(&request("ONLY"), Some(&detector))
        })
        .unwrap();
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec![field::DATE]);
    assert!(messages(&errors, field::DATE)[0].contains("14:30"));
}

#[test]
fn conflict_check_only_looks_at_the_base_occurrence() {
    // Clashes with the second Monday only.
    let store = InMemoryStore::with_occurrences(vec![existing("2024-01-15", "14:00", "15:00")]);
    let policy = BookingPolicy::default();
    let errors = store
        .transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, BoundaryPolicy::Inclusive);
            Validator::new(&policy, today()).validate(&request("WEEKLY"), Some(&detector))
        })
        .unwrap();
    assert!(errors.is_empty());
}

#[test]
fn weekly_conflict_check_starts_at_the_first_selected_weekday() {
    // 2024-01-02 is a Tuesday; a Monday-only series first books 2024-01-08.
    let mut req = request("WEEKLY");
    req.date = Some("2024-01-02".to_string());
    let policy = BookingPolicy::default();

    let clash_on_skipped_day =
        InMemoryStore::with_occurrences(vec![existing("2024-01-02", "14:00", "15:00")]);
    let errors = clash_on_skipped_day
        .transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, BoundaryPolicy::Inclusive);
            Validator::new(&policy, today()).validate(&req, Some(&detector))
        })
        .unwrap();
    assert!(errors.is_empty(), "{errors}");

    let clash_on_first_monday =
        InMemoryStore::with_occurrences(vec![existing("2024-01-08", "14:00", "15:00")]);
    let errors = clash_on_first_monday
        .transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, BoundaryPolicy::Inclusive);
            Validator::new(&policy, today()).validate(&req, Some(&detector))
        })
        .unwrap();
    assert_eq!(errors.fields().collect::<Vec<_>>(), vec![field::DATE]);
    assert!(messages(&errors, field::DATE)[0].contains("2024-01-08"));
}

#[test]
fn conflict_check_is_skipped_when_other_rules_fail() {
    let store = InMemoryStore::with_occurrences(vec![existing("2024-01-08", "14:30", "16:00")]);
    let policy = BookingPolicy::default();
    let mut req = request("WEEKLY");
    req.weekdays = vec!["SUNDAY".to_string()];
    let errors = store
        .transaction(|repo| {
            let detector = ConflictDetector::new(&*repo, BoundaryPolicy::Inclusive);
            Validator::new(&policy, today()).validate(&req, Some(&detector))
        })
        .unwrap();
    assert!(errors.contains(field::WEEKDAYS));
    assert!(!errors.contains(field::DATE));
}

// ── Properties ──────────────────────────────────────────────────────────────

#[test]
fn validation_is_repeatable() {
    let mut req = request("WEEKLY");
    req.end_time = Some("13:00".to_string());
    req.weekdays.push("SUNDAY".to_string());
    assert_eq!(validate(&req), validate(&req));
}

#[test]
fn check_wraps_errors_in_validation_variant() {
    let policy = BookingPolicy::default();
    let err = Validator::new(&policy, today())
        .check(&AppointmentRequest::default(), None)
        .unwrap_err();
    let BookingError::Validation(errors) = err else {
        panic!("expected validation error, got {err}");
    };
    // The default request has pattern "", which is not a valid token.
    assert!(errors.contains(field::RECURRENCE_PATTERN));
}

#[test]
fn errors_serialize_as_a_plain_map() {
    let mut req = request("ONLY");
    req.date = None;
    let json = serde_json::to_value(validate(&req)).unwrap();
    assert_eq!(json, serde_json::json!({ "date": ["is required"] }));
}
