/// In-memory result sink.
///
/// Holds a fixed set of known location identifiers (or accepts any) and
/// keeps every persisted visit with its attached activities so callers can
/// inspect exactly what a batch would have written.

use std::collections::BTreeMap;

use serde::Serialize;

use super::ResultSink;
use crate::model::{
    DischargeActivity, ImportError, LocationHandle, MeasurementInterval, Reading, VisitHandle,
};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersistedVisit {
    pub handle: VisitHandle,
    pub location: LocationHandle,
    pub interval: MeasurementInterval,
    pub comments: Option<String>,
    pub party: Option<String>,
    pub discharge_activities: Vec<DischargeActivity>,
    pub readings: Vec<Reading>,
}

#[derive(Debug, Default)]
pub struct MemorySink {
    locations: BTreeMap<String, i64>,
    accept_any_location: bool,
    visits: Vec<PersistedVisit>,
    /// Visit count when the open batch began.
    batch_start: Option<usize>,
    batches_committed: usize,
}

impl MemorySink {
    /// A sink that only knows the given location identifiers.
    pub fn with_locations<I, S>(identifiers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut sink = MemorySink::default();
        for identifier in identifiers {
            sink.register_location(identifier.into());
        }
        sink
    }

    /// A sink that registers every identifier it is asked about.
    pub fn accepting_any_location() -> Self {
        MemorySink {
            accept_any_location: true,
            ..MemorySink::default()
        }
    }

    fn register_location(&mut self, identifier: String) -> i64 {
        let next_id = self.locations.len() as i64 + 1;
        *self.locations.entry(identifier).or_insert(next_id)
    }

    pub fn visits(&self) -> &[PersistedVisit] {
        &self.visits
    }

    pub fn visits_for(&self, identifier: &str) -> Vec<&PersistedVisit> {
        self.visits
            .iter()
            .filter(|v| v.location.identifier == identifier)
            .collect()
    }

    pub fn batches_committed(&self) -> usize {
        self.batches_committed
    }

    fn visit_mut(&mut self, handle: VisitHandle) -> Result<&mut PersistedVisit, ImportError> {
        self.visits
            .iter_mut()
            .find(|v| v.handle == handle)
            .ok_or_else(|| ImportError::Sink(format!("unknown visit handle {}", handle.id)))
    }
}

impl ResultSink for MemorySink {
    fn resolve_location(&mut self, identifier: &str) -> Result<LocationHandle, ImportError> {
        let id = match self.locations.get(identifier) {
            Some(&id) => id,
            None if self.accept_any_location => self.register_location(identifier.to_string()),
            None => return Err(ImportError::LocationNotFound(identifier.to_string())),
        };

        Ok(LocationHandle {
            identifier: identifier.to_string(),
            id,
        })
    }

    fn persist_visit(
        &mut self,
        location: &LocationHandle,
        interval: &MeasurementInterval,
        comments: Option<&str>,
        party: Option<&str>,
    ) -> Result<VisitHandle, ImportError> {
        let handle = VisitHandle {
            id: self.visits.len() as i64 + 1,
        };
        self.visits.push(PersistedVisit {
            handle,
            location: location.clone(),
            interval: *interval,
            comments: comments.map(String::from),
            party: party.map(String::from),
            discharge_activities: Vec::new(),
            readings: Vec::new(),
        });
        Ok(handle)
    }

    fn attach_discharge(
        &mut self,
        visit: VisitHandle,
        activity: &DischargeActivity,
    ) -> Result<(), ImportError> {
        self.visit_mut(visit)?
            .discharge_activities
            .push(activity.clone());
        Ok(())
    }

    fn attach_reading(&mut self, visit: VisitHandle, reading: &Reading) -> Result<(), ImportError> {
        self.visit_mut(visit)?.readings.push(reading.clone());
        Ok(())
    }

    fn begin_batch(&mut self) -> Result<(), ImportError> {
        self.batch_start = Some(self.visits.len());
        Ok(())
    }

    fn commit_batch(&mut self) -> Result<(), ImportError> {
        self.batch_start = None;
        self.batches_committed += 1;
        Ok(())
    }

    fn rollback_batch(&mut self) -> Result<(), ImportError> {
        if let Some(start) = self.batch_start.take() {
            self.visits.truncate(start);
        }
        Ok(())
    }
}
