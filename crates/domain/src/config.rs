//! Application configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_GEOFENCE_RADIUS_METERS, DEFAULT_GPS_ATTEMPT_TIMEOUT_SECS, DEFAULT_GPS_MAX_ATTEMPTS,
    DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SYNC_INTERVAL_SECS,
};
use crate::errors::{FieldVisitError, Result};

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub geofence: GeofenceConfig,
    pub gps: GpsConfig,
    pub remote: RemoteConfig,
    pub log_level: String,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub enabled: bool,
    /// Retry tick while connected; `0` disables it.
    pub interval_seconds: u64,
    /// Send visits through the bulk endpoint in batches of this size when set.
    pub bulk_visit_batch_size: Option<usize>,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceConfig {
    pub radius_meters: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GpsConfig {
    pub attempt_timeout_secs: u64,
    pub max_attempts: u32,
}

/// Remote visit service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub sales_rep_id: Option<String>,
    pub max_attempts: u32,
}

impl Config {
    /// Reject values the rest of the system cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.database.path.trim().is_empty() {
            return Err(FieldVisitError::Config("database.path must not be empty".into()));
        }
        if self.database.pool_size == 0 {
            return Err(FieldVisitError::Config("database.pool_size must be at least 1".into()));
        }
        if !(self.geofence.radius_meters.is_finite() && self.geofence.radius_meters > 0.0) {
            return Err(FieldVisitError::Config("geofence.radius_meters must be positive".into()));
        }
        if self.gps.max_attempts == 0 {
            return Err(FieldVisitError::Config("gps.max_attempts must be at least 1".into()));
        }
        if self.sync.bulk_visit_batch_size == Some(0) {
            return Err(FieldVisitError::Config(
                "sync.bulk_visit_batch_size must be positive".into(),
            ));
        }
        if self.remote.max_attempts == 0 {
            return Err(FieldVisitError::Config("remote.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn interval(&self) -> Option<Duration> {
        (self.interval_seconds > 0).then(|| Duration::from_secs(self.interval_seconds))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl GpsConfig {
    pub fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database: DatabaseConfig::default(),
            sync: SyncConfig::default(),
            geofence: GeofenceConfig::default(),
            gps: GpsConfig::default(),
            remote: RemoteConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "fieldvisit.db".to_string(), pool_size: 4 }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: DEFAULT_SYNC_INTERVAL_SECS,
            bulk_visit_batch_size: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

impl Default for GeofenceConfig {
    fn default() -> Self {
        Self { radius_meters: DEFAULT_GEOFENCE_RADIUS_METERS }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            attempt_timeout_secs: DEFAULT_GPS_ATTEMPT_TIMEOUT_SECS,
            max_attempts: DEFAULT_GPS_MAX_ATTEMPTS,
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self { base_url: "http://localhost:8080".to_string(), sales_rep_id: None, max_attempts: 3 }
    }
}
