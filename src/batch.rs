/// Batch entry point.
///
/// Runs the whole pipeline for one ordered batch of validated records:
/// partition by location, consolidate every location, then flush all
/// visits to the sink. Every location is consolidated before anything is
/// written, so a fatal error (unknown location or ambiguous match) leaves
/// the sink untouched and the caller can retry the whole batch.

use serde::Serialize;

use crate::config::ImportConfig;
use crate::consolidate::consolidate_location;
use crate::logging::{self, LogScope};
use crate::model::{ImportError, LocationVisits, Record};
use crate::partition::partition_by_location;
use crate::sink::{ResultSink, flush_location};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsolidationSummary {
    pub locations: usize,
    pub records: usize,
    pub visits_created: usize,
    pub warnings: Vec<String>,
}

/// Consolidates all locations without touching the sink beyond location
/// lookups.
pub fn plan<S: ResultSink + ?Sized>(
    records: Vec<Record>,
    sink: &mut S,
    config: &ImportConfig,
) -> Result<Vec<LocationVisits>, ImportError> {
    let groups = partition_by_location(records, sink)?;

    groups
        .into_iter()
        .map(|group| consolidate_location(group.location, &group.records, config))
        .collect()
}

pub fn consolidate<S: ResultSink + ?Sized>(
    records: Vec<Record>,
    sink: &mut S,
    config: &ImportConfig,
) -> Result<ConsolidationSummary, ImportError> {
    let record_count = records.len();
    let planned = plan(records, sink, config)?;

    sink.begin_batch()?;
    let mut visits_created = 0;
    for location_visits in &planned {
        match flush_location(sink, location_visits) {
            Ok(count) => visits_created += count,
            Err(e) => {
                if let Err(rollback) = sink.rollback_batch() {
                    logging::error(LogScope::Sink, None, &rollback.to_string());
                }
                return Err(e);
            }
        }
    }
    sink.commit_batch().inspect_err(|e| {
        logging::error(LogScope::Sink, None, &format!("Commit failed: {}", e));
    })?;

    let summary = ConsolidationSummary {
        locations: planned.len(),
        records: record_count,
        visits_created,
        warnings: planned.into_iter().flat_map(|l| l.warnings).collect(),
    };

    logging::log_batch_summary(summary.locations, summary.visits_created, summary.warnings.len());
    Ok(summary)
}
