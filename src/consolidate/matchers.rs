//! Visit matching rules.
//!
//! Each matcher is a pure function over a record interval and the visits
//! created so far, returning the indices of every candidate visit. They run
//! in `MATCHERS` order; a later matcher only runs when every earlier one
//! returned no candidates.

use std::fmt;

use crate::model::{MeasurementInterval, Visit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    MeasurementId,
    Containment,
    SameDay,
}

impl fmt::Display for MatchRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchRule::MeasurementId => write!(f, "measurement id"),
            MatchRule::Containment => write!(f, "containment"),
            MatchRule::SameDay => write!(f, "same day"),
        }
    }
}

pub type Matcher = fn(&MeasurementInterval, &[Visit]) -> Vec<usize>;

/// Interval-based matchers in evaluation order.
pub const MATCHERS: &[(MatchRule, Matcher)] = &[
    (MatchRule::Containment, containing_visits),
    (MatchRule::SameDay, same_day_visits),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Matched { rule: MatchRule, index: usize },
    NoMatch,
    Ambiguous { rule: MatchRule, candidates: Vec<usize> },
}

/// Visits whose interval fully contains the record interval.
pub fn containing_visits(record: &MeasurementInterval, visits: &[Visit]) -> Vec<usize> {
    visits
        .iter()
        .enumerate()
        .filter(|(_, visit)| visit.interval.contains(record))
        .map(|(index, _)| index)
        .collect()
}

/// Visits that start on the record's start date or end on its end date.
pub fn same_day_visits(record: &MeasurementInterval, visits: &[Visit]) -> Vec<usize> {
    visits
        .iter()
        .enumerate()
        .filter(|(_, visit)| shares_calendar_day(&visit.interval, record))
        .map(|(index, _)| index)
        .collect()
}

/// Date-only comparison used by both the same-day rule and the
/// measurement-id fast path.
pub fn shares_calendar_day(visit: &MeasurementInterval, record: &MeasurementInterval) -> bool {
    visit.start_date() == record.start_date() || visit.end_date() == record.end_date()
}

/// Runs `MATCHERS` in order, stopping at the first rule with any candidates.
pub fn find_candidates(record: &MeasurementInterval, visits: &[Visit]) -> MatchOutcome {
    for (rule, matcher) in MATCHERS {
        let candidates = matcher(record, visits);
        match candidates.as_slice() {
            [] => continue,
            [index] => {
                return MatchOutcome::Matched {
                    rule: *rule,
                    index: *index,
                };
            }
            _ => {
                return MatchOutcome::Ambiguous {
                    rule: *rule,
                    candidates,
                };
            }
        }
    }
    MatchOutcome::NoMatch
}
