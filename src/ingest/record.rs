/// Raw stage/discharge rows and their self-validation.
///
/// A `RawRecord` is one already-tokenized input row with every column
/// optional. `RawRecord::validate` applies the data-entry rules and produces
/// an immutable `model::Record`, building the embedded reading (if any) along
/// the way. Column names follow the PascalCase headers of the import file.

use chrono::{DateTime, FixedOffset, Timelike};
use serde::Deserialize;

use crate::logging::{self, LogScope};
use crate::model::{
    DischargeMeasurement, ImportError, MeasurementDevice, MeasurementInterval, Reading,
    ReadingType, Record, RecordError, ValidationError,
};

pub const NO_RECORDS_IN_INPUT: &str = "No records found in input file.";

const DISCHARGE_KEY: &str = "Discharge";
const READING_KEY: &str = "ReadingValue";

// ============================================================================
// Raw row
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RawRecord {
    pub location_identifier: Option<String>,
    pub measurement_id: Option<String>,
    pub measurement_start_date_time: Option<String>,
    pub measurement_end_date_time: Option<String>,
    pub stage_at_start: Option<f64>,
    pub stage_at_end: Option<f64>,
    pub stage_units: Option<String>,
    pub discharge: Option<f64>,
    pub discharge_units: Option<String>,
    pub channel_name: Option<String>,
    pub channel_width: Option<f64>,
    pub width_units: Option<String>,
    pub channel_area: Option<f64>,
    pub area_units: Option<String>,
    pub channel_velocity: Option<f64>,
    pub velocity_units: Option<String>,
    pub party: Option<String>,
    pub comments: Option<String>,
    pub reading_parameter: Option<String>,
    pub reading_units: Option<String>,
    pub reading_value: Option<f64>,
    pub reading_type: Option<String>,
    pub reading_method: Option<String>,
    pub reading_publish: Option<String>,
    pub reading_uncertainty: Option<f64>,
    pub reading_device_manufacturer: Option<String>,
    pub reading_device_model: Option<String>,
    pub reading_device_serial_number: Option<String>,
    pub reading_sublocation: Option<String>,
}

/// Trimmed text, or `None` when missing or blank.
fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

fn required<'a>(field: &'static str, value: &'a Option<String>) -> Result<&'a str, ValidationError> {
    text(value).ok_or(ValidationError::Required { field })
}

fn empty_text(field: &'static str, value: &Option<String>, key: &'static str) -> Result<(), ValidationError> {
    match text(value) {
        Some(_) => Err(ValidationError::MustBeEmpty { field, key }),
        None => Ok(()),
    }
}

fn empty_value<T>(field: &'static str, value: &Option<T>, key: &'static str) -> Result<(), ValidationError> {
    match value {
        Some(_) => Err(ValidationError::MustBeEmpty { field, key }),
        None => Ok(()),
    }
}

fn timestamp(field: &'static str, value: &Option<String>) -> Result<DateTime<FixedOffset>, ValidationError> {
    let raw = required(field, value)?;
    DateTime::parse_from_rfc3339(raw).map_err(|_| ValidationError::InvalidTimestamp {
        field,
        value: raw.to_string(),
    })
}

/// Accepts `true/false/y/yes/n/no/1/0` in any case; anything else is unset.
pub fn parse_publish_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" | "1" | "true" => Some(true),
        "n" | "no" | "0" | "false" => Some(false),
        _ => None,
    }
}

/// Midpoint of the interval truncated to the whole minute, never earlier
/// than the interval start.
pub fn human_readable_midpoint(interval: &MeasurementInterval) -> DateTime<FixedOffset> {
    let midpoint = interval.start + interval.duration() / 2;
    let truncated = midpoint
        .with_second(0)
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(midpoint);

    truncated.max(interval.start)
}

impl RawRecord {
    pub fn validate(&self) -> Result<Record, ValidationError> {
        let location_identifier = required("LocationIdentifier", &self.location_identifier)?;

        let start = timestamp("MeasurementStartDateTime", &self.measurement_start_date_time)?;
        let end = timestamp("MeasurementEndDateTime", &self.measurement_end_date_time)?;
        if start > end {
            return Err(ValidationError::InvalidInterval {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        let interval = MeasurementInterval::new(start, end);

        let discharge = match self.discharge {
            Some(value) => Some(self.discharge_measurement(value)?),
            None => {
                self.ensure_no_discharge_fields()?;
                None
            }
        };

        let readings = self.reading(&interval)?.into_iter().collect::<Vec<_>>();

        let comments = text(&self.comments).map(String::from);
        if discharge.is_none() && readings.is_empty() && comments.is_none() {
            return Err(ValidationError::NoPayload);
        }

        Ok(Record {
            location_identifier: location_identifier.to_string(),
            measurement_id: self.measurement_id.clone(),
            interval,
            comments,
            party: text(&self.party).map(String::from),
            discharge,
            readings,
        })
    }

    fn discharge_measurement(&self, discharge: f64) -> Result<DischargeMeasurement, ValidationError> {
        let stage_units = text(&self.stage_units);
        if stage_units.is_none() {
            empty_value("StageAtStart", &self.stage_at_start, DISCHARGE_KEY)?;
            empty_value("StageAtEnd", &self.stage_at_end, DISCHARGE_KEY)?;
        }

        Ok(DischargeMeasurement {
            discharge,
            discharge_units: required("DischargeUnits", &self.discharge_units)?.to_string(),
            stage_at_start: self.stage_at_start,
            stage_at_end: self.stage_at_end,
            stage_units: stage_units.map(String::from),
            channel_name: required("ChannelName", &self.channel_name)?.to_string(),
            channel_width: self.channel_width,
            width_units: required("WidthUnits", &self.width_units)?.to_string(),
            channel_area: self.channel_area,
            area_units: required("AreaUnits", &self.area_units)?.to_string(),
            channel_velocity: self.channel_velocity,
            velocity_units: required("VelocityUnits", &self.velocity_units)?.to_string(),
        })
    }

    fn ensure_no_discharge_fields(&self) -> Result<(), ValidationError> {
        empty_value("StageAtStart", &self.stage_at_start, DISCHARGE_KEY)?;
        empty_value("StageAtEnd", &self.stage_at_end, DISCHARGE_KEY)?;
        empty_text("StageUnits", &self.stage_units, DISCHARGE_KEY)?;
        empty_text("DischargeUnits", &self.discharge_units, DISCHARGE_KEY)?;
        empty_text("ChannelName", &self.channel_name, DISCHARGE_KEY)?;
        empty_text("WidthUnits", &self.width_units, DISCHARGE_KEY)?;
        empty_text("AreaUnits", &self.area_units, DISCHARGE_KEY)?;
        empty_text("VelocityUnits", &self.velocity_units, DISCHARGE_KEY)?;
        Ok(())
    }

    fn reading(&self, interval: &MeasurementInterval) -> Result<Option<Reading>, ValidationError> {
        let (parameter_id, units, value) = match (
            text(&self.reading_parameter),
            text(&self.reading_units),
            self.reading_value,
        ) {
            (Some(p), Some(u), Some(v)) => (p, u, v),
            _ => {
                self.ensure_no_reading_fields()?;
                return Ok(None);
            }
        };

        let reading_type = match text(&self.reading_type) {
            Some(raw) => raw.parse::<ReadingType>().map_err(|_| ValidationError::UnrecognizedValue {
                field: "ReadingType",
                value: raw.to_string(),
            })?,
            None => ReadingType::Unknown,
        };

        let device = match (
            text(&self.reading_device_manufacturer),
            text(&self.reading_device_model),
            text(&self.reading_device_serial_number),
        ) {
            (Some(manufacturer), Some(model), Some(serial_number)) => Some(MeasurementDevice {
                manufacturer: manufacturer.to_string(),
                model: model.to_string(),
                serial_number: serial_number.to_string(),
            }),
            _ => {
                empty_text("ReadingDeviceManufacturer", &self.reading_device_manufacturer, "Device")?;
                empty_text("ReadingDeviceModel", &self.reading_device_model, "Device")?;
                empty_text("ReadingDeviceSerialNumber", &self.reading_device_serial_number, "Device")?;
                None
            }
        };

        Ok(Some(Reading {
            parameter_id: parameter_id.to_string(),
            units: units.to_string(),
            value,
            time: human_readable_midpoint(interval),
            reading_type,
            method: text(&self.reading_method).map(String::from),
            publish: text(&self.reading_publish).and_then(parse_publish_flag),
            uncertainty: self.reading_uncertainty,
            device,
            sub_location: text(&self.reading_sublocation).map(String::from),
            comments: text(&self.comments).map(String::from),
        }))
    }

    fn ensure_no_reading_fields(&self) -> Result<(), ValidationError> {
        empty_value("ReadingValue", &self.reading_value, READING_KEY)?;
        empty_text("ReadingParameter", &self.reading_parameter, READING_KEY)?;
        empty_text("ReadingUnits", &self.reading_units, READING_KEY)?;
        empty_text("ReadingType", &self.reading_type, READING_KEY)?;
        empty_value("ReadingUncertainty", &self.reading_uncertainty, READING_KEY)?;
        empty_text("ReadingMethod", &self.reading_method, READING_KEY)?;
        empty_text("ReadingDeviceManufacturer", &self.reading_device_manufacturer, READING_KEY)?;
        empty_text("ReadingDeviceModel", &self.reading_device_model, READING_KEY)?;
        empty_text("ReadingDeviceSerialNumber", &self.reading_device_serial_number, READING_KEY)?;
        empty_text("ReadingSublocation", &self.reading_sublocation, READING_KEY)?;
        Ok(())
    }
}

// ============================================================================
// Batch loading
// ============================================================================

/// Validates every raw row, collecting all failures with 1-based row numbers.
pub fn validate_all(raw: &[RawRecord]) -> Result<Vec<Record>, ImportError> {
    if raw.is_empty() {
        return Err(ImportError::Parse(NO_RECORDS_IN_INPUT.to_string()));
    }

    let mut records = Vec::with_capacity(raw.len());
    let mut errors = Vec::new();

    for (index, row) in raw.iter().enumerate() {
        match row.validate() {
            Ok(record) => records.push(record),
            Err(error) => errors.push(RecordError { row: index + 1, error }),
        }
    }

    if !errors.is_empty() {
        logging::error(
            LogScope::Import,
            None,
            &format!("{} of {} rows failed validation", errors.len(), raw.len()),
        );
        return Err(ImportError::InvalidRecords { errors });
    }

    logging::info(LogScope::Import, None, &format!("Parsed {} rows from input.", records.len()));
    Ok(records)
}

/// Deserializes a JSON array of raw rows and validates them.
pub fn parse_records_json(json: &str) -> Result<Vec<Record>, ImportError> {
    let raw: Vec<RawRecord> =
        serde_json::from_str(json).map_err(|e| ImportError::Parse(e.to_string()))?;
    validate_all(&raw)
}
