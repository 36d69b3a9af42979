//! Wire shapes exchanged with the remote visit service

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::anchor::GeofenceAnchor;
use super::customer::NewCustomer;
use super::visit::{CheckInEvidence, CheckOutEvidence, VisitKind, VisitRecord, VisitState};

/// Visit body for create, update and bulk calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitPayload {
    /// Device id of the visit; the remote deduplicates on it.
    pub dedupe_key: String,
    pub schedule_code: String,
    pub customer_code: String,
    pub scheduled_date: NaiveDate,
    pub unscheduled: bool,
    pub state: VisitState,
    pub check_in: Option<CheckInEvidence>,
    pub check_out: Option<CheckOutEvidence>,
    pub duration_minutes: Option<i64>,
    pub revision: u32,
}

impl From<&VisitRecord> for VisitPayload {
    fn from(visit: &VisitRecord) -> Self {
        Self {
            dedupe_key: visit.local_id.clone(),
            schedule_code: visit.key.schedule_code.clone(),
            customer_code: visit.key.customer_code.clone(),
            scheduled_date: visit.scheduled_date,
            unscheduled: visit.kind == VisitKind::Unscheduled,
            state: visit.state,
            check_in: visit.check_in.clone(),
            check_out: visit.check_out.clone(),
            duration_minutes: visit.duration_minutes,
            revision: visit.sync.revision,
        }
    }
}

/// Response of a visit creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteVisit {
    pub id: String,
}

/// Per-record answer of a bulk visit call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkVisitAck {
    pub dedupe_key: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
    /// The error is permanent; the record must not be retried as is.
    #[serde(default)]
    pub rejected: bool,
}

impl BulkVisitAck {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorPayload {
    pub dedupe_key: String,
    pub customer_key: String,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
}

impl From<&GeofenceAnchor> for AnchorPayload {
    fn from(anchor: &GeofenceAnchor) -> Self {
        Self {
            dedupe_key: anchor.local_id.clone(),
            customer_key: anchor.customer_code.clone(),
            latitude: anchor.latitude,
            longitude: anchor.longitude,
            captured_at: anchor.captured_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    pub dedupe_key: String,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl From<&NewCustomer> for CustomerPayload {
    fn from(customer: &NewCustomer) -> Self {
        Self {
            dedupe_key: customer.local_id.clone(),
            name: customer.name.clone(),
            address: customer.address.clone(),
            phone: customer.phone.clone(),
            latitude: customer.latitude,
            longitude: customer.longitude,
        }
    }
}

/// Response of a customer creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCustomer {
    pub customer_key: String,
}
