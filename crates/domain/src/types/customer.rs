//! Customers registered on the device while offline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::sync::SyncMeta;
use crate::errors::{FieldVisitError, Result};

/// Input collected by the registration form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomerDraft {
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl NewCustomerDraft {
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(FieldVisitError::InvalidInput("customer name is required".into()));
        }
        if self.address.trim().is_empty() {
            return Err(FieldVisitError::InvalidInput("customer address is required".into()));
        }
        if self.latitude.is_some() != self.longitude.is_some() {
            return Err(FieldVisitError::InvalidInput(
                "latitude and longitude must be given together".into(),
            ));
        }
        Ok(())
    }
}

/// A customer waiting for (or holding) a remote customer code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub local_id: String,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub sync: SyncMeta,
}

impl NewCustomer {
    pub fn from_draft(
        local_id: String,
        draft: NewCustomerDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            local_id,
            name: draft.name.trim().to_string(),
            address: draft.address.trim().to_string(),
            phone: draft.phone,
            latitude: draft.latitude,
            longitude: draft.longitude,
            created_at,
            sync: SyncMeta::new_pending(),
        }
    }

    /// Customer code assigned by the remote, once created there.
    pub fn customer_code(&self) -> Option<&str> {
        self.sync.remote_id.as_deref()
    }
}
