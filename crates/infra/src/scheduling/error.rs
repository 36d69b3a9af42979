//! Scheduler error types

use std::time::Duration;

use fieldvisit_domain::FieldVisitError;
use thiserror::Error;

use crate::errors::InfraError;

/// Lifecycle errors of background monitors
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Scheduler already running")]
    AlreadyRunning,

    #[error("Scheduler not running")]
    NotRunning,

    #[error("Scheduler did not stop within {duration:?}")]
    Timeout { duration: Duration },

    #[error("Task join failed: {0}")]
    TaskJoinFailed(#[from] tokio::task::JoinError),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let domain_err = match err {
            SchedulerError::AlreadyRunning | SchedulerError::NotRunning => {
                FieldVisitError::InvalidInput(err.to_string())
            }
            _ => FieldVisitError::Internal(err.to_string()),
        };
        InfraError(domain_err)
    }
}

impl From<SchedulerError> for FieldVisitError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

pub type SchedulerResult<T> = Result<T, SchedulerError>;
