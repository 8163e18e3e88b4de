/// Core data types for the field visit consolidation service.
///
/// This module defines the shared domain model imported by all other modules:
/// validated measurement records, the visits they are consolidated into,
/// the activities attached to those visits, and the error types.
/// It contains no I/O and no consolidation logic.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Grouping identifiers
// ---------------------------------------------------------------------------

/// Measurement ID commonly exported by legacy 3.X systems for every row.
/// It carries no grouping information and is treated as "no identifier".
pub const LEGACY_EMPTY_MEASUREMENT_ID: &str = "0";

/// Normalizes a measurement ID into the key used for visit lookups.
///
/// Returns `None` for missing, blank, or legacy sentinel IDs. Keys are
/// trimmed and lowercased so `" M1 "` and `"m1"` refer to the same visit.
pub fn grouping_key(measurement_id: Option<&str>) -> Option<String> {
    let trimmed = measurement_id?.trim();
    if trimmed.is_empty() || trimmed == LEGACY_EMPTY_MEASUREMENT_ID {
        return None;
    }
    Some(trimmed.to_lowercase())
}

// ---------------------------------------------------------------------------
// Intervals
// ---------------------------------------------------------------------------

/// A closed measurement interval with offset-aware endpoints.
///
/// Date-only comparisons use the calendar date in each timestamp's own
/// offset, so a 23:30-05:00 start is on the local day, not the UTC one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MeasurementInterval {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl MeasurementInterval {
    /// Callers are expected to have validated `start <= end`.
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> Self {
        debug_assert!(start <= end, "interval start must not be after end");
        Self { start, end }
    }

    /// True when `other` lies entirely within this interval (inclusive).
    pub fn contains(&self, other: &MeasurementInterval) -> bool {
        self.start <= other.start && self.end >= other.end
    }

    /// Smallest interval covering both `self` and `other`.
    pub fn union(&self, other: &MeasurementInterval) -> MeasurementInterval {
        MeasurementInterval {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn start_date(&self) -> NaiveDate {
        self.start.date_naive()
    }

    pub fn end_date(&self) -> NaiveDate {
        self.end.date_naive()
    }

    /// True when the interval starts and ends on different calendar dates.
    pub fn spans_midnight(&self) -> bool {
        self.start_date() < self.end_date()
    }
}

impl fmt::Display for MeasurementInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Start={} End={}",
            self.start.to_rfc3339(),
            self.end.to_rfc3339()
        )
    }
}

// ---------------------------------------------------------------------------
// Record payload
// ---------------------------------------------------------------------------

/// Stage/discharge measurement carried by a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeMeasurement {
    pub discharge: f64,
    pub discharge_units: String,
    pub stage_at_start: Option<f64>,
    pub stage_at_end: Option<f64>,
    pub stage_units: Option<String>,
    pub channel_name: String,
    pub channel_width: Option<f64>,
    pub width_units: String,
    pub channel_area: Option<f64>,
    pub area_units: String,
    pub channel_velocity: Option<f64>,
    pub velocity_units: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ReadingType {
    Routine,
    Reset,
    Cleaning,
    AfterCleaning,
    ReferencePrimary,
    Reference,
    ExtremeMin,
    ExtremeMax,
    #[default]
    Unknown,
}

impl ReadingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingType::Routine => "Routine",
            ReadingType::Reset => "Reset",
            ReadingType::Cleaning => "Cleaning",
            ReadingType::AfterCleaning => "AfterCleaning",
            ReadingType::ReferencePrimary => "ReferencePrimary",
            ReadingType::Reference => "Reference",
            ReadingType::ExtremeMin => "ExtremeMin",
            ReadingType::ExtremeMax => "ExtremeMax",
            ReadingType::Unknown => "Unknown",
        }
    }
}

impl FromStr for ReadingType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [ReadingType; 9] = [
            ReadingType::Routine,
            ReadingType::Reset,
            ReadingType::Cleaning,
            ReadingType::AfterCleaning,
            ReadingType::ReferencePrimary,
            ReadingType::Reference,
            ReadingType::ExtremeMin,
            ReadingType::ExtremeMax,
            ReadingType::Unknown,
        ];
        ALL.into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or(())
    }
}

/// Instrument that produced a reading. All three parts are required.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeasurementDevice {
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
}

/// A single instrument reading taken during a visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub parameter_id: String,
    pub units: String,
    pub value: f64,
    pub time: DateTime<FixedOffset>,
    pub reading_type: ReadingType,
    pub method: Option<String>,
    pub publish: Option<bool>,
    pub uncertainty: Option<f64>,
    pub device: Option<MeasurementDevice>,
    pub sub_location: Option<String>,
    pub comments: Option<String>,
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One validated field-measurement row.
///
/// Produced by `ingest::record::RawRecord::validate`; immutable afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub location_identifier: String,
    pub measurement_id: Option<String>,
    pub interval: MeasurementInterval,
    pub comments: Option<String>,
    pub party: Option<String>,
    pub discharge: Option<DischargeMeasurement>,
    pub readings: Vec<Reading>,
}

impl Record {
    pub fn grouping_key(&self) -> Option<String> {
        grouping_key(self.measurement_id.as_deref())
    }
}

// ---------------------------------------------------------------------------
// Visits and activities
// ---------------------------------------------------------------------------

/// Sink-side handle for a resolved location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LocationHandle {
    pub identifier: String,
    pub id: i64,
}

/// Sink-side handle for a persisted visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct VisitHandle {
    pub id: i64,
}

/// A discharge measurement attached to a visit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DischargeActivity {
    pub interval: MeasurementInterval,
    pub party: Option<String>,
    pub comments: Option<String>,
    pub measurement: DischargeMeasurement,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Activity {
    Discharge(DischargeActivity),
    Reading(Reading),
}

/// One consolidated trip to a location.
///
/// `comments` holds unique fragments joined by `"\n"` and `party` unique
/// names joined by `", "`; both are empty strings when nothing was recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Visit {
    pub interval: MeasurementInterval,
    pub comments: String,
    pub party: String,
    pub activities: Vec<Activity>,
}

impl Visit {
    pub fn comments(&self) -> Option<&str> {
        Some(self.comments.as_str()).filter(|c| !c.is_empty())
    }

    pub fn party(&self) -> Option<&str> {
        Some(self.party.as_str()).filter(|p| !p.is_empty())
    }
}

/// The finalized visits of one location, in creation order.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationVisits {
    pub location: LocationHandle,
    pub visits: Vec<Visit>,
    pub warnings: Vec<String>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// A single field-level problem found while validating a raw record.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Required { field: &'static str },
    #[error("{field} must be empty when {key} is not set")]
    MustBeEmpty {
        field: &'static str,
        key: &'static str,
    },
    #[error("{field} is not in the expected timestamp format: '{value}'")]
    InvalidTimestamp { field: &'static str, value: String },
    #[error("MeasurementStartDateTime={start} must not be after MeasurementEndDateTime={end}")]
    InvalidInterval { start: String, end: String },
    #[error("{field} has unrecognized value '{value}'")]
    UnrecognizedValue { field: &'static str, value: String },
    #[error("Each row must contain at least one stage/discharge pair or at least one reading")]
    NoPayload,
}

/// A validation failure tied to its 1-based input row.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("row {row}: {error}")]
pub struct RecordError {
    pub row: usize,
    pub error: ValidationError,
}

/// Errors that abort an import batch.
#[derive(Debug, Error)]
pub enum ImportError {
    /// The sink does not know the location identifier.
    #[error("Location not found: {0}")]
    LocationNotFound(String),
    /// A record matched two or more existing visits.
    #[error(
        "Confused merge of {location} record {record} with {} possible visits: {}",
        .candidates.len(),
        join_intervals(.candidates)
    )]
    ConsolidationAmbiguous {
        location: String,
        record: MeasurementInterval,
        candidates: Vec<MeasurementInterval>,
    },
    #[error("Input contains {} invalid records:\n{}", .errors.len(), join_errors(.errors))]
    InvalidRecords { errors: Vec<RecordError> },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Sink error: {0}")]
    Sink(String),
}

fn join_intervals(intervals: &[MeasurementInterval]) -> String {
    intervals
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn join_errors(errors: &[RecordError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
