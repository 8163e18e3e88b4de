/// Attaches a record's payload to the visit it was consolidated into.
///
/// No matching happens here: a discharge measurement becomes one
/// `DischargeActivity`, and each embedded reading is forwarded as-is, in
/// that order.

use crate::model::{Activity, DischargeActivity, Record, Visit};

/// Builds the discharge activity for a record, if it carries a discharge.
pub fn discharge_activity(record: &Record) -> Option<DischargeActivity> {
    let measurement = record.discharge.as_ref()?;

    Some(DischargeActivity {
        interval: record.interval,
        party: record.party.clone(),
        comments: record.comments.clone(),
        measurement: measurement.clone(),
    })
}

pub fn attach_record(visit: &mut Visit, record: &Record) {
    if let Some(activity) = discharge_activity(record) {
        visit.activities.push(Activity::Discharge(activity));
    }

    visit
        .activities
        .extend(record.readings.iter().cloned().map(Activity::Reading));
}
