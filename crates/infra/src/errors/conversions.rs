//! Conversions from external infrastructure errors into domain errors.

use fieldvisit_domain::FieldVisitError;
use reqwest::{Error as HttpError, StatusCode};
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub FieldVisitError);

impl From<InfraError> for FieldVisitError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<FieldVisitError> for InfraError {
    fn from(value: FieldVisitError) -> Self {
        InfraError(value)
    }
}

/// Extension trait to make the conversion logic explicit in tests and within
/// this module.
trait IntoFieldVisitError {
    fn into_field_visit(self) -> FieldVisitError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → FieldVisitError */
/* -------------------------------------------------------------------------- */

impl IntoFieldVisitError for SqlError {
    fn into_field_visit(self) -> FieldVisitError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        FieldVisitError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        FieldVisitError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067 | 1555) => {
                        FieldVisitError::Database(format!("unique constraint violation: {message}"))
                    }
                    (ErrorCode::DiskFull, _) => FieldVisitError::Database("disk is full".into()),
                    (ErrorCode::ReadOnly, _) => {
                        FieldVisitError::Database("database is read-only".into())
                    }
                    _ => FieldVisitError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => {
                FieldVisitError::NotFound("no rows returned by query".into())
            }
            RE::FromSqlConversionFailure(_, _, cause) => {
                FieldVisitError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                FieldVisitError::Database(format!("invalid column type: {ty}"))
            }
            RE::Utf8Error(_) => {
                FieldVisitError::Database("invalid UTF-8 returned from sqlite".into())
            }
            RE::InvalidPath(path) => FieldVisitError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            RE::InvalidQuery => FieldVisitError::Database("invalid SQL query".into()),
            other => FieldVisitError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_field_visit())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → FieldVisitError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(FieldVisitError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* serde_json::Error → FieldVisitError */
/* -------------------------------------------------------------------------- */

impl From<serde_json::Error> for InfraError {
    fn from(value: serde_json::Error) -> Self {
        InfraError(FieldVisitError::Internal(format!("JSON encoding: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → FieldVisitError */
/* -------------------------------------------------------------------------- */

impl IntoFieldVisitError for HttpError {
    fn into_field_visit(self) -> FieldVisitError {
        if self.is_timeout() {
            return FieldVisitError::RemoteUnavailable("HTTP request timed out".into());
        }

        if self.is_connect() {
            return FieldVisitError::RemoteUnavailable("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            return map_status(status, "");
        }

        if self.is_decode() {
            return FieldVisitError::RemoteUnavailable(format!("unreadable response: {self}"));
        }

        FieldVisitError::RemoteUnavailable(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_field_visit())
    }
}

/// Classify a non-success HTTP status.
///
/// Permanent client errors are rejections; auth, throttling, timeouts and
/// server errors leave the record retryable.
pub fn map_status(status: StatusCode, body: &str) -> FieldVisitError {
    let code = status.as_u16();
    let mut message =
        format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));
    if !body.trim().is_empty() {
        message.push_str(": ");
        message.push_str(body.trim());
    }

    match code {
        401 | 403 | 408 | 429 => FieldVisitError::RemoteUnavailable(message),
        400..=499 => FieldVisitError::RemoteRejected(message),
        _ => FieldVisitError::RemoteUnavailable(message),
    }
}

/// A failed local write: nothing was recorded.
pub fn durable_write_error(err: impl Into<InfraError>) -> FieldVisitError {
    let InfraError(err) = err.into();
    match err {
        FieldVisitError::Database(message) | FieldVisitError::Internal(message) => {
            FieldVisitError::DurableWriteFailure(message)
        }
        other => other,
    }
}

pub fn map_join_error(err: tokio::task::JoinError) -> FieldVisitError {
    if err.is_cancelled() {
        FieldVisitError::Internal("blocking database task cancelled".into())
    } else {
        FieldVisitError::Internal(format!("blocking database task panicked: {err}"))
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
