//! Visit records and the lifecycle state machine
//!
//! A visit moves `Scheduled -> CheckedIn -> Completed` and never revisits a
//! state. Unscheduled visits are created directly in `CheckedIn`. The
//! transitions here are pure; persistence and the single-open-visit rule are
//! enforced by the visit service on top of them.

use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::geo::GpsFix;
use super::schedule::ScheduleEntry;
use super::sync::SyncMeta;
use crate::errors::{FieldVisitError, Result};

/// Composite identity of a visit: one customer inside one schedule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VisitKey {
    pub schedule_code: String,
    pub customer_code: String,
}

impl VisitKey {
    pub fn new(schedule_code: impl Into<String>, customer_code: impl Into<String>) -> Self {
        Self { schedule_code: schedule_code.into(), customer_code: customer_code.into() }
    }
}

impl fmt::Display for VisitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.schedule_code, self.customer_code)
    }
}

/// Lifecycle state of a visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitState {
    Scheduled,
    CheckedIn,
    Completed,
}

crate::impl_domain_status_conversions!(VisitState {
    Scheduled => "scheduled",
    CheckedIn => "checked_in",
    Completed => "completed",
});

/// Whether the visit came from the server schedule or was started ad hoc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitKind {
    Scheduled,
    Unscheduled,
}

crate::impl_domain_status_conversions!(VisitKind {
    Scheduled => "scheduled",
    Unscheduled => "unscheduled",
});

/// Evidence captured when arriving at the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInEvidence {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
    pub photo_ref: Option<String>,
    pub within_geofence: bool,
    /// Distance to the anchor when one was cached.
    pub distance_meters: Option<f64>,
}

/// Evidence captured when leaving the customer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutEvidence {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub accuracy_meters: f64,
}

/// Device-side view of one visit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    /// Stable device identifier, doubles as the remote dedupe key.
    pub local_id: String,
    pub key: VisitKey,
    pub kind: VisitKind,
    pub scheduled_date: NaiveDate,
    pub customer_name: String,
    pub customer_address: String,
    pub state: VisitState,
    pub check_in: Option<CheckInEvidence>,
    pub check_out: Option<CheckOutEvidence>,
    pub duration_minutes: Option<i64>,
    pub sync: SyncMeta,
    /// Last local business mutation; `None` for records projected from the
    /// server schedule.
    pub updated_at: Option<DateTime<Utc>>,
}

impl VisitRecord {
    /// Project a server schedule entry without any local evidence.
    ///
    /// The projection is a pure function of the entry so that merging stays
    /// deterministic.
    pub fn from_schedule(entry: &ScheduleEntry) -> Self {
        let key = entry.key();
        Self {
            local_id: format!("schedule:{key}"),
            kind: VisitKind::Scheduled,
            scheduled_date: entry.scheduled_date,
            customer_name: entry.customer_name.clone(),
            customer_address: entry.customer_address.clone(),
            state: if entry.completed { VisitState::Completed } else { VisitState::Scheduled },
            check_in: None,
            check_out: None,
            duration_minutes: None,
            sync: SyncMeta::confirmed(),
            updated_at: None,
            key,
        }
    }

    /// Start a visit that has no schedule entry; it enters `CheckedIn`
    /// directly.
    pub fn start_unscheduled(
        local_id: String,
        key: VisitKey,
        customer_name: String,
        customer_address: String,
        today: NaiveDate,
        evidence: CheckInEvidence,
    ) -> Self {
        Self {
            local_id,
            key,
            kind: VisitKind::Unscheduled,
            scheduled_date: today,
            customer_name,
            customer_address,
            state: VisitState::CheckedIn,
            updated_at: Some(evidence.timestamp),
            check_in: Some(evidence),
            check_out: None,
            duration_minutes: None,
            sync: SyncMeta::new_pending(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == VisitState::CheckedIn
    }

    /// `Scheduled -> CheckedIn`
    pub fn check_in(&mut self, evidence: CheckInEvidence) -> Result<()> {
        if self.state != VisitState::Scheduled {
            return Err(self.invalid_transition("check in"));
        }

        self.updated_at = Some(evidence.timestamp);
        self.state = VisitState::CheckedIn;
        self.check_in = Some(evidence);
        self.check_out = None;
        self.duration_minutes = None;
        self.sync.open_revision();
        Ok(())
    }

    /// `CheckedIn -> Completed`
    ///
    /// A check-out stamped before the check-in (device clock moved backwards)
    /// is clamped to the check-in time.
    pub fn check_out(&mut self, mut evidence: CheckOutEvidence) -> Result<()> {
        let checked_in_at = match (&self.state, &self.check_in) {
            (VisitState::CheckedIn, Some(check_in)) => check_in.timestamp,
            _ => return Err(self.invalid_transition("check out")),
        };

        if evidence.timestamp < checked_in_at {
            evidence.timestamp = checked_in_at;
        }

        self.duration_minutes = Some(duration_minutes(checked_in_at, evidence.timestamp));
        self.updated_at = Some(evidence.timestamp);
        self.state = VisitState::Completed;
        self.check_out = Some(evidence);
        self.sync.open_revision();
        Ok(())
    }

    /// Verify the state/evidence invariants of a single record.
    pub fn validate(&self) -> Result<()> {
        let corrupt = |detail: &str| {
            Err(FieldVisitError::StateCorruption(format!("visit {}: {detail}", self.key)))
        };

        match (self.state, &self.check_in, &self.check_out) {
            (VisitState::Scheduled, _, Some(_)) => corrupt("scheduled visit has a check-out"),
            (VisitState::CheckedIn, None, _) => corrupt("checked-in visit without check-in"),
            (VisitState::CheckedIn, Some(_), Some(_)) => {
                corrupt("checked-in visit already has a check-out")
            }
            (VisitState::Completed, Some(check_in), Some(check_out)) => {
                if check_out.timestamp < check_in.timestamp {
                    return corrupt("check-out precedes check-in");
                }
                let expected = duration_minutes(check_in.timestamp, check_out.timestamp);
                if self.duration_minutes != Some(expected) {
                    return corrupt("duration does not match evidence");
                }
                Ok(())
            }
            // Completed straight from the server flag carries no evidence.
            (VisitState::Completed, None, None) => Ok(()),
            (VisitState::Completed, _, _) => corrupt("completed visit with partial evidence"),
            _ => Ok(()),
        }
    }

    fn invalid_transition(&self, action: &str) -> FieldVisitError {
        FieldVisitError::InvalidTransition {
            visit: self.key.to_string(),
            from: self.state.to_string(),
            action: action.to_string(),
        }
    }
}

/// Business fields written by a single lifecycle transition.
///
/// Stores apply a patch as a read-modify-write that only touches these fields
/// and opens a new sync revision. `expected_state` guards against a racing
/// transition on the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitPatch {
    pub expected_state: VisitState,
    pub state: VisitState,
    pub check_in: Option<CheckInEvidence>,
    pub check_out: Option<CheckOutEvidence>,
    pub duration_minutes: Option<i64>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl VisitPatch {
    /// Capture the difference between a record and its transitioned copy.
    pub fn between(before: &VisitRecord, after: &VisitRecord) -> Self {
        Self {
            expected_state: before.state,
            state: after.state,
            check_in: after.check_in.clone(),
            check_out: after.check_out.clone(),
            duration_minutes: after.duration_minutes,
            updated_at: after.updated_at,
        }
    }
}

impl VisitRecord {
    /// Apply a transition patch to the stored copy of the record.
    pub fn apply_patch(&mut self, patch: VisitPatch) -> Result<()> {
        if self.state != patch.expected_state {
            return Err(self.invalid_transition(&format!("apply {} patch", patch.state)));
        }

        self.state = patch.state;
        self.check_in = patch.check_in;
        self.check_out = patch.check_out;
        self.duration_minutes = patch.duration_minutes;
        self.updated_at = patch.updated_at;
        self.sync.open_revision();
        self.validate()
    }
}

/// Check-in command input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInRequest {
    pub key: VisitKey,
    /// Fix captured by the caller; acquired from the location provider
    /// when absent.
    pub fix: Option<GpsFix>,
    pub photo_ref: Option<String>,
    /// The user acknowledged a geofence warning.
    #[serde(default)]
    pub confirm_outside_geofence: bool,
}

/// Check-out command input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckOutRequest {
    pub key: VisitKey,
    pub fix: Option<GpsFix>,
}

/// Input for a visit to a customer that is not on today's schedule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnscheduledVisitRequest {
    pub customer_code: String,
    pub customer_name: String,
    pub customer_address: String,
    pub fix: Option<GpsFix>,
    pub photo_ref: Option<String>,
    #[serde(default)]
    pub confirm_outside_geofence: bool,
}

/// Whole minutes between check-in and check-out, never negative.
pub fn duration_minutes(check_in: DateTime<Utc>, check_out: DateTime<Utc>) -> i64 {
    (check_out - check_in).num_seconds().max(0) / 60
}
