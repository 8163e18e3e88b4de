/// Location partitioning.
///
/// Organizes a flat batch of records into per-location groups, resolving
/// each location identifier through the sink before any consolidation
/// starts. An unknown identifier aborts the whole batch.

use std::collections::BTreeMap;

use crate::logging::{self, LogScope};
use crate::model::{ImportError, LocationHandle, Record};
use crate::sink::ResultSink;

/// One location's records, sorted ascending by interval start.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationGroup {
    pub location: LocationHandle,
    pub records: Vec<Record>,
}

/// Groups records by exact location identifier.
///
/// Groups come back in ascending order of the resolved identifier. Within a
/// group the sort is stable, so records with equal start times keep their
/// input order.
pub fn partition_by_location<S: ResultSink + ?Sized>(
    records: Vec<Record>,
    sink: &mut S,
) -> Result<Vec<LocationGroup>, ImportError> {
    let mut by_identifier: BTreeMap<String, Vec<Record>> = BTreeMap::new();
    for record in records {
        by_identifier
            .entry(record.location_identifier.clone())
            .or_default()
            .push(record);
    }

    let mut groups = Vec::with_capacity(by_identifier.len());
    for (identifier, mut records) in by_identifier {
        let location = sink.resolve_location(&identifier).inspect_err(|e| {
            logging::error(LogScope::Partition, Some(&identifier), &e.to_string());
        })?;

        records.sort_by_key(|r| r.interval.start);
        groups.push(LocationGroup { location, records });
    }

    groups.sort_by(|a, b| a.location.identifier.cmp(&b.location.identifier));
    Ok(groups)
}
