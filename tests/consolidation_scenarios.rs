/// End-to-end consolidation scenarios through the public batch API.
///
/// Every test runs against `MemorySink`, so no database is needed:
///   cargo test --test consolidation_scenarios
///
/// Covers the worked scenarios (single record, measurement-id merge,
/// containment, same-day merge and ambiguity, legacy "0" ids, text merging),
/// batch atomicity on fatal errors, and properties that must hold after
/// every merge.

use fieldvisit_service::batch::{self, ConsolidationSummary};
use fieldvisit_service::config::ImportConfig;
use fieldvisit_service::consolidate::{LocationConsolidator, consolidate_location};
use fieldvisit_service::ingest::record::parse_records_json;
use fieldvisit_service::model::{ImportError, LocationHandle, LocationVisits, MeasurementInterval, Record};
use fieldvisit_service::sink::MemorySink;

use chrono::DateTime;

// ---------------------------------------------------------------------------
// Test Helpers
// ---------------------------------------------------------------------------

const LOCATION: &str = "05568500";

fn interval(start: &str, end: &str) -> MeasurementInterval {
    MeasurementInterval::new(
        DateTime::parse_from_rfc3339(start).expect("valid start"),
        DateTime::parse_from_rfc3339(end).expect("valid end"),
    )
}

fn record(start: &str, end: &str) -> Record {
    Record {
        location_identifier: LOCATION.to_string(),
        measurement_id: None,
        interval: interval(start, end),
        comments: None,
        party: None,
        discharge: None,
        readings: Vec::new(),
    }
}

fn with_id(mut record: Record, id: &str) -> Record {
    record.measurement_id = Some(id.to_string());
    record
}

fn with_comments(mut record: Record, comments: &str) -> Record {
    record.comments = Some(comments.to_string());
    record
}

fn location() -> LocationHandle {
    LocationHandle {
        identifier: LOCATION.to_string(),
        id: 1,
    }
}

fn run_batch(records: Vec<Record>) -> (Result<ConsolidationSummary, ImportError>, MemorySink) {
    let mut sink = MemorySink::with_locations([LOCATION]);
    let result = batch::consolidate(records, &mut sink, &ImportConfig::default());
    (result, sink)
}

// ---------------------------------------------------------------------------
// Worked scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_single_record_creates_one_visit() {
    let (result, sink) = run_batch(vec![record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00")]);
    let summary = result.expect("single record should consolidate");

    assert_eq!(summary.visits_created, 1);
    assert!(summary.warnings.is_empty(), "unexpected warnings: {:?}", summary.warnings);
    assert_eq!(
        sink.visits()[0].interval,
        interval("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00")
    );
}

#[test]
fn test_shared_measurement_id_merges_records() {
    let (result, sink) = run_batch(vec![
        with_id(record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), "M1"),
        with_id(record("2024-05-01T09:10:00-05:00", "2024-05-01T09:15:00-05:00"), "M1"),
    ]);
    assert_eq!(result.unwrap().visits_created, 1);
    assert_eq!(
        sink.visits()[0].interval,
        interval("2024-05-01T09:00:00-05:00", "2024-05-01T09:15:00-05:00"),
        "merged visit should span both records"
    );
}

#[test]
fn test_contained_record_merges_without_expanding() {
    let (result, sink) = run_batch(vec![
        record("2024-05-01T09:00:00-05:00", "2024-05-01T12:00:00-05:00"),
        record("2024-05-01T10:00:00-05:00", "2024-05-01T10:30:00-05:00"),
    ]);
    assert_eq!(result.unwrap().visits_created, 1);
    assert_eq!(
        sink.visits()[0].interval,
        interval("2024-05-01T09:00:00-05:00", "2024-05-01T12:00:00-05:00")
    );
}

#[test]
fn test_same_day_records_merge_into_one_visit() {
    let (result, sink) = run_batch(vec![
        record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"),
        record("2024-05-01T14:00:00-05:00", "2024-05-01T14:05:00-05:00"),
    ]);
    assert_eq!(result.unwrap().visits_created, 1);
    assert_eq!(
        sink.visits()[0].interval,
        interval("2024-05-01T09:00:00-05:00", "2024-05-01T14:05:00-05:00")
    );
}

#[test]
fn test_two_same_day_candidates_abort_the_batch() {
    // The second record's +05:00 date is May 2, so it starts its own visit.
    // The third shares a start date with the first visit and an end date
    // with the second.
    let (result, sink) = run_batch(vec![
        record("2024-05-01T09:00:00Z", "2024-05-01T09:05:00Z"),
        record("2024-05-02T01:00:00+05:00", "2024-05-02T01:05:00+05:00"),
        record("2024-05-01T21:00:00Z", "2024-05-02T02:30:00+05:00"),
    ]);

    match result {
        Err(ImportError::ConsolidationAmbiguous {
            location,
            record,
            candidates,
        }) => {
            assert_eq!(location, LOCATION);
            assert_eq!(record, interval("2024-05-01T21:00:00Z", "2024-05-02T02:30:00+05:00"));
            assert_eq!(candidates.len(), 2);
        }
        other => panic!("expected ConsolidationAmbiguous, got {:?}", other),
    }
    assert!(sink.visits().is_empty(), "ambiguous batch must not write visits");
    assert_eq!(sink.batches_committed(), 0);
}

#[test]
fn test_ambiguity_message_lists_candidates() {
    let (result, _) = run_batch(vec![
        record("2024-05-01T09:00:00Z", "2024-05-01T09:05:00Z"),
        record("2024-05-02T01:00:00+05:00", "2024-05-02T01:05:00+05:00"),
        record("2024-05-01T21:00:00Z", "2024-05-02T02:30:00+05:00"),
    ]);
    let message = result.expect_err("batch should fail").to_string();
    assert!(message.starts_with("Confused merge of 05568500"), "got: {}", message);
    assert!(message.contains("with 2 possible visits"), "got: {}", message);
}

#[test]
fn test_legacy_zero_measurement_id_is_not_a_grouping_key() {
    // Different days: a real shared id would still need a shared date, and
    // "0" must not group at all, so these stay apart.
    let (result, sink) = run_batch(vec![
        with_id(record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), "0"),
        with_id(record("2024-05-02T09:00:00-05:00", "2024-05-02T09:05:00-05:00"), "0"),
    ]);
    assert_eq!(result.unwrap().visits_created, 2);
    assert_eq!(sink.visits().len(), 2);
}

#[test]
fn test_legacy_zero_measurement_id_still_uses_fallback_rules() {
    let (result, _) = run_batch(vec![
        with_id(record("2024-05-01T09:00:00-05:00", "2024-05-01T12:00:00-05:00"), "0"),
        with_id(record("2024-05-01T10:00:00-05:00", "2024-05-01T10:30:00-05:00"), "0"),
    ]);
    assert_eq!(result.unwrap().visits_created, 1, "containment should still apply");
}

#[test]
fn test_duplicate_comments_are_merged_once() {
    let (result, sink) = run_batch(vec![
        with_comments(record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), "rising limb"),
        with_comments(record("2024-05-01T10:00:00-05:00", "2024-05-01T10:05:00-05:00"), "rising limb"),
    ]);
    result.unwrap();
    assert_eq!(sink.visits()[0].comments.as_deref(), Some("rising limb"));
}

#[test]
fn test_distinct_comments_are_joined_by_newline() {
    let (result, sink) = run_batch(vec![
        with_comments(record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), "rising limb"),
        with_comments(record("2024-05-01T10:00:00-05:00", "2024-05-01T10:05:00-05:00"), "falling limb"),
    ]);
    result.unwrap();
    assert_eq!(sink.visits()[0].comments.as_deref(), Some("rising limb\nfalling limb"));
}

// ---------------------------------------------------------------------------
// Batch behaviour
// ---------------------------------------------------------------------------

#[test]
fn test_locations_are_consolidated_independently() {
    let mut sink = MemorySink::with_locations([LOCATION, "05586100"]);
    let mut downstream = record("2024-05-01T10:00:00-05:00", "2024-05-01T10:30:00-05:00");
    downstream.location_identifier = "05586100".to_string();

    let summary = batch::consolidate(
        vec![
            record("2024-05-01T09:00:00-05:00", "2024-05-01T12:00:00-05:00"),
            downstream,
        ],
        &mut sink,
        &ImportConfig::default(),
    )
    .expect("both locations are known");

    assert_eq!(summary.locations, 2);
    assert_eq!(summary.visits_created, 2, "a contained interval at another location must not merge");
    assert_eq!(sink.visits_for(LOCATION).len(), 1);
    let downstream_visits = sink.visits_for("05586100");
    assert_eq!(downstream_visits.len(), 1);
    assert_eq!(
        downstream_visits[0].interval,
        interval("2024-05-01T10:00:00-05:00", "2024-05-01T10:30:00-05:00")
    );
}

#[test]
fn test_unknown_location_leaves_sink_empty() {
    let mut sink = MemorySink::with_locations([LOCATION]);
    let mut stray = record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00");
    stray.location_identifier = "UNKNOWN".to_string();

    let result = batch::consolidate(
        vec![record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), stray],
        &mut sink,
        &ImportConfig::default(),
    );
    assert!(matches!(result, Err(ImportError::LocationNotFound(ref id)) if id == "UNKNOWN"));
    assert!(sink.visits().is_empty());
}

#[test]
fn test_measurement_id_reused_on_another_day_warns_and_repoints() {
    let (result, sink) = run_batch(vec![
        with_id(record("2024-05-01T09:00:00-05:00", "2024-05-01T09:05:00-05:00"), "M7"),
        with_id(record("2024-05-02T20:00:00-05:00", "2024-05-03T08:00:00-05:00"), "M7"),
        with_id(record("2024-05-03T09:00:00-05:00", "2024-05-03T09:05:00-05:00"), "M7"),
    ]);
    let summary = result.expect("id collisions are a warning, not an error");

    assert_eq!(sink.visits().len(), 2, "third record follows the id to the second visit");
    assert_eq!(
        sink.visits()[1].interval,
        interval("2024-05-02T20:00:00-05:00", "2024-05-03T09:05:00-05:00")
    );
    assert_eq!(summary.warnings.len(), 1, "got: {:?}", summary.warnings);
    assert!(summary.warnings[0].starts_with("MeasurementId=m7"), "got: {}", summary.warnings[0]);
}

#[test]
fn test_configured_span_threshold_produces_warning() {
    let config = ImportConfig::from_toml_str("max_visit_span_hours = 2").unwrap();
    let mut sink = MemorySink::with_locations([LOCATION]);
    let summary = batch::consolidate(
        vec![
            record("2024-05-01T08:00:00-05:00", "2024-05-01T08:05:00-05:00"),
            record("2024-05-01T15:00:00-05:00", "2024-05-01T15:05:00-05:00"),
        ],
        &mut sink,
        &config,
    )
    .unwrap();
    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("exceeds 2 hours"), "got: {}", summary.warnings[0]);
}

#[test]
fn test_json_rows_flow_through_to_sink() {
    let json = r#"[
        {
            "LocationIdentifier": "05568500",
            "MeasurementId": "M1",
            "MeasurementStartDateTime": "2024-05-01T09:00:00-05:00",
            "MeasurementEndDateTime": "2024-05-01T09:05:00-05:00",
            "Discharge": 42300.0,
            "DischargeUnits": "ft^3/s",
            "ChannelName": "Main",
            "WidthUnits": "ft",
            "AreaUnits": "ft^2",
            "VelocityUnits": "ft/s",
            "Party": "JD",
            "Comments": "rising limb"
        },
        {
            "LocationIdentifier": "05568500",
            "MeasurementId": "m1",
            "MeasurementStartDateTime": "2024-05-01T09:10:00-05:00",
            "MeasurementEndDateTime": "2024-05-01T09:15:00-05:00",
            "ReadingParameter": "HG",
            "ReadingUnits": "ft",
            "ReadingValue": 14.25,
            "ReadingPublish": "yes",
            "Party": "AB, JD"
        }
    ]"#;

    let records = parse_records_json(json).expect("rows should validate");
    let (result, sink) = run_batch(records);
    assert_eq!(result.unwrap().visits_created, 1);

    let visit = &sink.visits()[0];
    assert_eq!(visit.party.as_deref(), Some("JD, AB"));
    assert_eq!(visit.discharge_activities.len(), 1);
    assert_eq!(visit.readings.len(), 1);
    assert_eq!(visit.readings[0].publish, Some(true));
}

#[test]
fn test_invalid_json_rows_are_reported_together() {
    let json = r#"[
        {"LocationIdentifier": "05568500"},
        {"MeasurementStartDateTime": "2024-05-01T09:00:00-05:00"}
    ]"#;
    match parse_records_json(json) {
        Err(ImportError::InvalidRecords { errors }) => {
            let rows: Vec<_> = errors.iter().map(|e| e.row).collect();
            assert_eq!(rows, vec![1, 2]);
        }
        other => panic!("expected InvalidRecords, got {:?}", other),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

fn mixed_batch() -> Vec<Record> {
    vec![
        with_id(record("2024-05-01T08:00:00-05:00", "2024-05-01T08:10:00-05:00"), "A"),
        record("2024-05-01T08:02:00-05:00", "2024-05-01T08:04:00-05:00"),
        with_comments(record("2024-05-01T13:00:00-05:00", "2024-05-01T13:30:00-05:00"), "afternoon"),
        with_id(record("2024-05-02T07:00:00-05:00", "2024-05-02T07:20:00-05:00"), "B"),
        with_id(record("2024-05-02T11:00:00-05:00", "2024-05-02T11:05:00-05:00"), "b"),
        record("2024-05-04T10:00:00-05:00", "2024-05-04T10:05:00-05:00"),
    ]
}

#[test]
fn test_assigned_visit_contains_record_and_never_shrinks() {
    let config = ImportConfig::default();
    let mut consolidator = LocationConsolidator::new(location(), &config);

    for record in mixed_batch() {
        let before: Vec<MeasurementInterval> = consolidator.visits().iter().map(|v| v.interval).collect();
        let index = consolidator.add_record(&record).expect("batch has no ambiguity");
        let after = consolidator.visits();

        assert!(
            after[index].interval.contains(&record.interval),
            "visit {} should contain record {}",
            after[index].interval,
            record.interval
        );
        for (old, new) in before.iter().zip(after) {
            assert!(new.interval.contains(old), "visit shrank from {} to {}", old, new.interval);
        }
    }

    assert_eq!(consolidator.visits().len(), 3);
}

fn interval_and_comments(location_visits: &LocationVisits) -> Vec<(MeasurementInterval, String)> {
    location_visits
        .visits
        .iter()
        .map(|visit| (visit.interval, visit.comments.clone()))
        .collect()
}

#[test]
fn test_repeating_a_record_changes_nothing() {
    let config = ImportConfig::default();
    let original = mixed_batch();
    let mut doubled = Vec::new();
    for record in &original {
        doubled.push(record.clone());
        doubled.push(record.clone());
    }

    let once = consolidate_location(location(), &original, &config).unwrap();
    let twice = consolidate_location(location(), &doubled, &config).unwrap();

    assert_eq!(interval_and_comments(&once), interval_and_comments(&twice));
}

#[test]
fn test_consolidation_is_deterministic() {
    let config = ImportConfig::default();
    let first = consolidate_location(location(), &mixed_batch(), &config).unwrap();
    let second = consolidate_location(location(), &mixed_batch(), &config).unwrap();
    assert_eq!(first, second);
}
