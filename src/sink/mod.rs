/// Result sinks: where consolidated visits end up.
///
/// The consolidator never talks to a sink while matching. Finalized visits
/// are handed over afterwards through `flush_location`, one
/// `persist_visit` call per visit followed by its activities in attachment
/// order.
///
/// Submodules:
/// - `memory`: in-process sink for tests and dry runs.
/// - `database`: writes visits and activities to PostgreSQL.

pub mod memory;
pub mod database;

use crate::model::{
    Activity, DischargeActivity, ImportError, LocationHandle, LocationVisits,
    MeasurementInterval, Reading, VisitHandle,
};

pub use memory::MemorySink;
pub use database::PostgresSink;

pub trait ResultSink {
    /// Fails with `ImportError::LocationNotFound` for unknown identifiers.
    fn resolve_location(&mut self, identifier: &str) -> Result<LocationHandle, ImportError>;

    fn persist_visit(
        &mut self,
        location: &LocationHandle,
        interval: &MeasurementInterval,
        comments: Option<&str>,
        party: Option<&str>,
    ) -> Result<VisitHandle, ImportError>;

    fn attach_discharge(
        &mut self,
        visit: VisitHandle,
        activity: &DischargeActivity,
    ) -> Result<(), ImportError>;

    fn attach_reading(&mut self, visit: VisitHandle, reading: &Reading) -> Result<(), ImportError>;

    /// Called once before the first visit of a batch is persisted.
    fn begin_batch(&mut self) -> Result<(), ImportError> {
        Ok(())
    }

    /// Called once after every visit of a batch has been persisted.
    fn commit_batch(&mut self) -> Result<(), ImportError> {
        Ok(())
    }

    /// Called instead of `commit_batch` when persisting fails part-way.
    fn rollback_batch(&mut self) -> Result<(), ImportError> {
        Ok(())
    }
}

/// Persists every visit of one location; returns how many were written.
pub fn flush_location<S: ResultSink + ?Sized>(
    sink: &mut S,
    location_visits: &LocationVisits,
) -> Result<usize, ImportError> {
    for visit in &location_visits.visits {
        let handle = sink.persist_visit(
            &location_visits.location,
            &visit.interval,
            visit.comments(),
            visit.party(),
        )?;

        for activity in &visit.activities {
            match activity {
                Activity::Discharge(discharge) => sink.attach_discharge(handle, discharge)?,
                Activity::Reading(reading) => sink.attach_reading(handle, reading)?,
            }
        }
    }

    Ok(location_visits.visits.len())
}
