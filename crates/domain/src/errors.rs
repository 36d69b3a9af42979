//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for FieldVisit
///
/// Variants mirror the failure taxonomy of the visit lifecycle: some are
/// advisory (`GeofenceWarning`), some are retried silently by the sync engine
/// (`RemoteUnavailable`) and the rest abort the operation they came from.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum FieldVisitError {
    /// Device is outside the customer geofence; the caller may retry with an
    /// explicit override.
    #[error("Outside geofence: {distance_meters:.0}m from anchor (radius {radius_meters:.0}m)")]
    GeofenceWarning { distance_meters: f64, radius_meters: f64 },

    #[error("Visit {open_visit} is already checked in")]
    ConcurrentVisitConflict { open_visit: String },

    #[error("Invalid transition for visit {visit}: cannot {action} while {from}")]
    InvalidTransition { visit: String, from: String, action: String },

    #[error("Visit {visit} is scheduled for {scheduled}, not {today}")]
    ScheduleMismatch { visit: String, scheduled: String, today: String },

    #[error("GPS unavailable after {attempts} attempt(s)")]
    GpsUnavailable { attempts: u32 },

    #[error("Remote unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Remote rejected: {0}")]
    RemoteRejected(String),

    #[error("Durable write failed: {0}")]
    DurableWriteFailure(String),

    #[error("State corruption: {0}")]
    StateCorruption(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl FieldVisitError {
    /// Whether repeating the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GpsUnavailable { .. } | Self::RemoteUnavailable(_) | Self::Database(_)
        )
    }

    /// Stable label suitable for structured logs.
    pub fn label(&self) -> &'static str {
        match self {
            Self::GeofenceWarning { .. } => "geofence_warning",
            Self::ConcurrentVisitConflict { .. } => "concurrent_visit_conflict",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::ScheduleMismatch { .. } => "schedule_mismatch",
            Self::GpsUnavailable { .. } => "gps_unavailable",
            Self::RemoteUnavailable(_) => "remote_unavailable",
            Self::RemoteRejected(_) => "remote_rejected",
            Self::DurableWriteFailure(_) => "durable_write_failure",
            Self::StateCorruption(_) => "state_corruption",
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for FieldVisit operations
pub type Result<T> = std::result::Result<T, FieldVisitError>;
