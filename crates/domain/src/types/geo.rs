//! Location evidence and geofence verdicts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single position fix reported by the device location provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GpsFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy radius reported by the provider.
    pub accuracy_meters: f64,
    pub captured_at: DateTime<Utc>,
}

impl GpsFix {
    pub fn new(
        latitude: f64,
        longitude: f64,
        accuracy_meters: f64,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self { latitude, longitude, accuracy_meters, captured_at }
    }

    /// Whether the coordinates are on the globe at all.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
            && self.accuracy_meters >= 0.0
    }
}

/// Outcome of comparing a fix with the cached customer anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GeofenceVerdict {
    Inside,
    Outside,
    /// No anchor cached for the customer yet.
    NoAnchor,
}

/// Geofence evaluation result, kept on the check-in evidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeofenceCheck {
    pub verdict: GeofenceVerdict,
    pub distance_meters: Option<f64>,
    pub radius_meters: f64,
}

impl GeofenceCheck {
    /// Value recorded as `within_geofence`. A missing anchor has nothing to
    /// violate.
    pub fn within_geofence(&self) -> bool {
        !matches!(self.verdict, GeofenceVerdict::Outside)
    }
}
