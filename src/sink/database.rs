/// PostgreSQL result sink.
///
/// Resolves locations from `field_data.locations` and writes visits,
/// discharge activities and readings into the tables created by
/// `sql/001_field_visits.sql`. A batch runs inside one transaction so a
/// failure part-way through leaves no visits behind.

use std::collections::HashMap;

use postgres::{Client, NoTls};

use super::ResultSink;
use crate::logging::{self, LogScope};
use crate::model::{
    DischargeActivity, ImportError, LocationHandle, MeasurementInterval, Reading, VisitHandle,
};

/// Environment variable holding the connection string.
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

pub struct PostgresSink {
    client: Client,
    /// Identifier → handle; locations are looked up once per sink.
    location_cache: HashMap<String, LocationHandle>,
}

fn sink_error(context: &str, err: postgres::Error) -> ImportError {
    ImportError::Sink(format!("{}: {}", context, err))
}

impl PostgresSink {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            location_cache: HashMap::new(),
        }
    }

    pub fn connect(database_url: &str) -> Result<Self, ImportError> {
        let client = Client::connect(database_url, NoTls)
            .map_err(|e| sink_error("connecting to database", e))?;
        Ok(Self::new(client))
    }

    /// Connects using `DATABASE_URL` (loaded from `.env` when present).
    pub fn from_env() -> Result<Self, ImportError> {
        dotenv::dotenv().ok();
        let url = std::env::var(DATABASE_URL_ENV)
            .map_err(|_| ImportError::Config(format!("{} must be set", DATABASE_URL_ENV)))?;
        Self::connect(&url)
    }

    pub fn client(&mut self) -> &mut Client {
        &mut self.client
    }
}

impl ResultSink for PostgresSink {
    fn resolve_location(&mut self, identifier: &str) -> Result<LocationHandle, ImportError> {
        if let Some(handle) = self.location_cache.get(identifier) {
            return Ok(handle.clone());
        }

        let row = self
            .client
            .query_opt(
                "SELECT location_id, identifier
                 FROM field_data.locations
                 WHERE identifier = $1",
                &[&identifier],
            )
            .map_err(|e| sink_error("location lookup", e))?
            .ok_or_else(|| ImportError::LocationNotFound(identifier.to_string()))?;

        let handle = LocationHandle {
            id: row.get(0),
            identifier: row.get(1),
        };
        self.location_cache
            .insert(identifier.to_string(), handle.clone());
        Ok(handle)
    }

    fn persist_visit(
        &mut self,
        location: &LocationHandle,
        interval: &MeasurementInterval,
        comments: Option<&str>,
        party: Option<&str>,
    ) -> Result<VisitHandle, ImportError> {
        let row = self
            .client
            .query_one(
                "INSERT INTO field_data.visits (location_id, start_time, end_time, comments, party)
                 VALUES ($1, $2, $3, $4, $5)
                 RETURNING visit_id",
                &[&location.id, &interval.start, &interval.end, &comments, &party],
            )
            .map_err(|e| sink_error("inserting visit", e))?;

        Ok(VisitHandle { id: row.get(0) })
    }

    fn attach_discharge(
        &mut self,
        visit: VisitHandle,
        activity: &DischargeActivity,
    ) -> Result<(), ImportError> {
        let m = &activity.measurement;
        self.client
            .execute(
                "INSERT INTO field_data.discharge_activities (
                    visit_id, start_time, end_time, party, comments,
                    discharge, discharge_units,
                    stage_at_start, stage_at_end, stage_units,
                    channel_name, channel_width, width_units,
                    channel_area, area_units, channel_velocity, velocity_units
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
                &[
                    &visit.id,
                    &activity.interval.start,
                    &activity.interval.end,
                    &activity.party,
                    &activity.comments,
                    &m.discharge,
                    &m.discharge_units,
                    &m.stage_at_start,
                    &m.stage_at_end,
                    &m.stage_units,
                    &m.channel_name,
                    &m.channel_width,
                    &m.width_units,
                    &m.channel_area,
                    &m.area_units,
                    &m.channel_velocity,
                    &m.velocity_units,
                ],
            )
            .map_err(|e| sink_error("inserting discharge activity", e))?;
        Ok(())
    }

    fn attach_reading(&mut self, visit: VisitHandle, reading: &Reading) -> Result<(), ImportError> {
        let (manufacturer, model, serial_number) = match &reading.device {
            Some(d) => (
                Some(d.manufacturer.as_str()),
                Some(d.model.as_str()),
                Some(d.serial_number.as_str()),
            ),
            None => (None, None, None),
        };

        self.client
            .execute(
                "INSERT INTO field_data.readings (
                    visit_id, parameter_id, units, value, reading_time, reading_type,
                    method, publish, uncertainty,
                    device_manufacturer, device_model, device_serial_number,
                    sub_location, comments
                 ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
                &[
                    &visit.id,
                    &reading.parameter_id,
                    &reading.units,
                    &reading.value,
                    &reading.time,
                    &reading.reading_type.as_str(),
                    &reading.method,
                    &reading.publish,
                    &reading.uncertainty,
                    &manufacturer,
                    &model,
                    &serial_number,
                    &reading.sub_location,
                    &reading.comments,
                ],
            )
            .map_err(|e| sink_error("inserting reading", e))?;
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), ImportError> {
        self.client
            .batch_execute("BEGIN")
            .map_err(|e| sink_error("starting transaction", e))
    }

    fn commit_batch(&mut self) -> Result<(), ImportError> {
        self.client
            .batch_execute("COMMIT")
            .map_err(|e| sink_error("committing transaction", e))
    }

    fn rollback_batch(&mut self) -> Result<(), ImportError> {
        logging::warn(LogScope::Sink, None, "Rolling back partially written batch");
        self.client
            .batch_execute("ROLLBACK")
            .map_err(|e| sink_error("rolling back transaction", e))
    }
}

// ---------------------------------------------------------------------------
// Integration Tests - live database
// ---------------------------------------------------------------------------
//
// These need a PostgreSQL instance with sql/001_field_visits.sql applied and
// DATABASE_URL set. They are #[ignore]d so normal builds don't depend on a
// database.
//
// To run them manually:
//   cargo test -- --ignored postgres_sink
