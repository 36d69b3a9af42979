//! Cached customer locations used to validate proximity offline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::geo::GpsFix;
use super::sync::SyncMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceAnchor {
    pub local_id: String,
    pub customer_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub captured_at: DateTime<Utc>,
    pub sync: SyncMeta,
}

impl GeofenceAnchor {
    pub fn from_fix(local_id: String, customer_code: impl Into<String>, fix: &GpsFix) -> Self {
        Self {
            local_id,
            customer_code: customer_code.into(),
            latitude: fix.latitude,
            longitude: fix.longitude,
            captured_at: fix.captured_at,
            sync: SyncMeta::new_pending(),
        }
    }

    /// An anchor only ever gets replaced by a strictly newer one.
    pub fn is_newer_than(&self, other: &GeofenceAnchor) -> bool {
        self.captured_at > other.captured_at
    }
}
