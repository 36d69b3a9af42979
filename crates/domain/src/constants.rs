//! Domain constants
//!
//! Centralized location for domain-level constants used throughout the
//! workspace.

/// Mean earth radius used by the haversine distance.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Default geofence tolerance around a customer anchor.
pub const DEFAULT_GEOFENCE_RADIUS_METERS: f64 = 100.0;

// GPS acquisition
pub const DEFAULT_GPS_ATTEMPT_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_GPS_MAX_ATTEMPTS: u32 = 3;

// Sync
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const MAX_ERROR_REASON_LENGTH: usize = 256;

/// Prefix of schedule codes generated on the device for unscheduled visits.
pub const UNSCHEDULED_CODE_PREFIX: &str = "adhoc";
