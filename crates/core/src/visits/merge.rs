//! Merge of the server schedule with local visit records
//!
//! A local record owns its key entirely; server entries without a local
//! record are projected into synthetic records. The result is sorted by
//! `(scheduled_date, schedule_code, customer_code)` and is stable under
//! re-merging its own output.

use std::collections::{HashMap, HashSet};

use fieldvisit_domain::{FieldVisitError, Result, ScheduleEntry, VisitKey, VisitRecord};
use tracing::warn;

/// Build the unified visit list.
///
/// Fails with `StateCorruption` when a local record breaks its own
/// invariants, when two local records share a key, or when more than one
/// visit is checked in.
pub fn merge(schedule: &[ScheduleEntry], local: &[VisitRecord]) -> Result<Vec<VisitRecord>> {
    let mut by_key: HashMap<&VisitKey, &VisitRecord> = HashMap::with_capacity(local.len());
    for record in local {
        record.validate()?;
        if by_key.insert(&record.key, record).is_some() {
            return Err(FieldVisitError::StateCorruption(format!(
                "two local records for visit {}",
                record.key
            )));
        }
    }

    let mut merged = Vec::with_capacity(schedule.len() + local.len());
    let mut seen: HashSet<VisitKey> = HashSet::with_capacity(schedule.len());

    for entry in schedule {
        let key = entry.key();
        if !seen.insert(key.clone()) {
            warn!(visit = %key, "duplicate schedule entry ignored");
            continue;
        }

        match by_key.remove(&key) {
            Some(record) => merged.push(record.clone()),
            None => merged.push(VisitRecord::from_schedule(entry)),
        }
    }

    // Unscheduled visits and entries that left the server window.
    merged.extend(by_key.into_values().cloned());

    merged.sort_by(|a, b| (a.scheduled_date, &a.key).cmp(&(b.scheduled_date, &b.key)));

    let open: Vec<&VisitKey> = merged.iter().filter(|r| r.is_open()).map(|r| &r.key).collect();
    if open.len() > 1 {
        let keys: Vec<String> = open.iter().map(ToString::to_string).collect();
        return Err(FieldVisitError::StateCorruption(format!(
            "more than one visit checked in: {}",
            keys.join(", ")
        )));
    }

    Ok(merged)
}
