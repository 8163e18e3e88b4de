//! Record-to-visit consolidation.
//!
//! One `LocationConsolidator` owns all working state for a single location:
//! the visits created so far (in creation order) and the measurement-id index.
//! Records must be fed in ascending start-time order; each one is matched to
//! an existing visit or starts a new one, and its activities are attached to
//! whichever visit it resolved to.
//!
//! Matching order:
//! 1. measurement-id fast path (same id, and a shared start or end date)
//! 2. `matchers::MATCHERS` (containment, then same day)
//! 3. otherwise a new visit
//!
//! Two or more candidates from a matcher abort the location.

pub mod matchers;
pub mod merge;

use std::collections::HashMap;

use crate::attach;
use crate::config::ImportConfig;
use crate::logging::{self, LogScope};
use crate::model::{ImportError, LocationHandle, LocationVisits, Record, Visit};
use matchers::{MatchOutcome, MatchRule};

pub struct LocationConsolidator<'a> {
    location: LocationHandle,
    config: &'a ImportConfig,
    visits: Vec<Visit>,
    visits_by_measurement_id: HashMap<String, usize>,
    warnings: Vec<String>,
}

impl<'a> LocationConsolidator<'a> {
    pub fn new(location: LocationHandle, config: &'a ImportConfig) -> Self {
        Self {
            location,
            config,
            visits: Vec::new(),
            visits_by_measurement_id: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn visits(&self) -> &[Visit] {
        &self.visits
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Assigns `record` to a visit, attaches its activities, and returns the
    /// visit's index.
    pub fn add_record(&mut self, record: &Record) -> Result<usize, ImportError> {
        let index = self.merge_or_create(record)?;
        attach::attach_record(&mut self.visits[index], record);
        Ok(index)
    }

    /// Finalizes the location's visits.
    pub fn finish(self) -> LocationVisits {
        let identifier = self.location.identifier.as_str();
        logging::info(
            LogScope::Consolidate,
            Some(identifier),
            &format!("{} created {} visits.", identifier, self.visits.len()),
        );

        let midnight_visits: Vec<String> = self
            .visits
            .iter()
            .filter(|v| v.interval.spans_midnight())
            .map(|v| v.interval.to_string())
            .collect();

        if !midnight_visits.is_empty() {
            logging::info(
                LogScope::Consolidate,
                Some(identifier),
                &format!(
                    "{} had {} visits spanning midnight: {}",
                    identifier,
                    midnight_visits.len(),
                    midnight_visits.join(", ")
                ),
            );
        }

        LocationVisits {
            location: self.location,
            visits: self.visits,
            warnings: self.warnings,
        }
    }

    fn merge_or_create(&mut self, record: &Record) -> Result<usize, ImportError> {
        if let Some(index) = self.find_existing_visit(record)? {
            self.merge_into(index, record);
            return Ok(index);
        }

        self.visits.push(Visit {
            interval: record.interval,
            comments: record.comments.clone().unwrap_or_default(),
            party: record.party.clone().unwrap_or_default(),
            activities: Vec::new(),
        });
        let index = self.visits.len() - 1;

        if let Some(key) = record.grouping_key() {
            self.register_measurement_id(index, key);
        }

        Ok(index)
    }

    fn find_existing_visit(&self, record: &Record) -> Result<Option<usize>, ImportError> {
        let location = self.location.identifier.as_str();

        if let Some(index) = self.measurement_id_match(record) {
            logging::debug(
                LogScope::Consolidate,
                Some(location),
                &format!(
                    "Merging existing visit {} with {} record {} (measurementId={})",
                    self.visits[index].interval,
                    MatchRule::MeasurementId,
                    record.interval,
                    record.measurement_id.as_deref().unwrap_or_default().trim()
                ),
            );
            return Ok(Some(index));
        }

        match matchers::find_candidates(&record.interval, &self.visits) {
            MatchOutcome::Matched { rule, index } => {
                logging::debug(
                    LogScope::Consolidate,
                    Some(location),
                    &format!(
                        "Merging existing visit {} with {} record {}",
                        self.visits[index].interval, rule, record.interval
                    ),
                );
                Ok(Some(index))
            }
            MatchOutcome::NoMatch => Ok(None),
            MatchOutcome::Ambiguous { rule, candidates } => {
                let error = ImportError::ConsolidationAmbiguous {
                    location: location.to_string(),
                    record: record.interval,
                    candidates: candidates.iter().map(|&i| self.visits[i].interval).collect(),
                };
                logging::error(
                    LogScope::Consolidate,
                    Some(location),
                    &format!("{} ({} rule)", error, rule),
                );
                Err(error)
            }
        }
    }

    fn measurement_id_match(&self, record: &Record) -> Option<usize> {
        let key = record.grouping_key()?;
        let index = *self.visits_by_measurement_id.get(&key)?;
        matchers::shares_calendar_day(&self.visits[index].interval, &record.interval)
            .then_some(index)
    }

    fn merge_into(&mut self, index: usize, record: &Record) {
        let visit = &mut self.visits[index];
        visit.interval = visit.interval.union(&record.interval);
        visit.comments = merge::merge_comments(&visit.comments, record.comments.as_deref());
        visit.party = merge::merge_party(&visit.party, record.party.as_deref());
        let interval = visit.interval;

        let span = interval.duration();
        if span > self.config.max_visit_span() {
            self.warn(format!(
                "{} visit {} exceeds {} hours TotalHours={:.1}",
                self.location.identifier,
                interval,
                self.config.max_visit_span_hours,
                span.num_seconds() as f64 / 3600.0
            ));
        }

        if let Some(key) = record.grouping_key() {
            self.register_measurement_id(index, key);
        }
    }

    /// Points `key` at the visit, repointing (with a warning) when it was
    /// already associated with a different visit.
    ///
    /// Last write wins. A mislabelled id on another day moves every later
    /// match for that id to the newest visit; this is only a warning.
    fn register_measurement_id(&mut self, index: usize, key: String) {
        let previous = self.visits_by_measurement_id.insert(key.clone(), index);

        if let Some(previous) = previous.filter(|&p| p != index) {
            self.warn(format!(
                "MeasurementId={} is already associated with a different {} visit {}. \
                 Re-associating with visit {}",
                key,
                self.location.identifier,
                self.visits[previous].interval,
                self.visits[index].interval
            ));
        }
    }

    fn warn(&mut self, message: String) {
        logging::warn(
            LogScope::Consolidate,
            Some(self.location.identifier.as_str()),
            &message,
        );
        self.warnings.push(message);
    }
}

/// Consolidates one location's records, which must already be sorted by
/// interval start. Nothing is persisted; the caller flushes the result.
pub fn consolidate_location(
    location: LocationHandle,
    records: &[Record],
    config: &ImportConfig,
) -> Result<LocationVisits, ImportError> {
    let mut consolidator = LocationConsolidator::new(location, config);
    for record in records {
        consolidator.add_record(record)?;
    }
    Ok(consolidator.finish())
}
