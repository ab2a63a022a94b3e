//! Error types for the scheduler.

use thiserror::Error;

use crate::gate::SourceDescriptor;
use crate::job::JobId;
use crate::schedule::ScheduleError;

/// Errors raised by a [`JobStore`](crate::store::JobStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Row does not exist.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Backend failure.
    #[error("Database error: {0}")]
    Database(String),

    /// Stored column could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors raised by the [`CronRegistry`](crate::registry::CronRegistry).
#[derive(Debug, Error)]
pub enum RegistryError {
    /// A timer is already armed for this job. Indicates a broken invariant.
    #[error("Job {0} already has an armed timer")]
    DuplicateRegistration(JobId),
}

/// Errors returned by a [`GenerationService`](crate::generation::GenerationService).
#[derive(Debug, Error)]
pub enum GenerationError {
    /// Transport level failure.
    #[error("Generation request failed: {0}")]
    Request(String),

    /// Service answered with a non-success status.
    #[error("Generation service returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Service answered with an unreadable body.
    #[error("Invalid generation response: {0}")]
    InvalidResponse(String),
}

/// A trigger rejected by the [`TriggerGate`](crate::gate::TriggerGate).
#[derive(Debug, Clone, Error)]
#[error("{reason}")]
pub struct AuthorizationError {
    /// Human-readable reason.
    pub reason: String,
    /// The descriptor that was rejected, kept for audit.
    pub descriptor: SourceDescriptor,
}

/// Scheduler error.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Malformed job definition.
    #[error("Invalid job definition: {field}: {message}")]
    Validation { field: String, message: String },

    /// Job does not exist.
    #[error("Job not found: {0}")]
    NotFound(JobId),

    /// Timer registry invariant violation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Trigger denied by the gate.
    #[error("Trigger rejected: {0}")]
    Unauthorized(#[from] AuthorizationError),

    /// Persistence failure.
    #[error("Store error: {0}")]
    Store(StoreError),

    /// Invalid component configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SchedulerError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl From<StoreError> for SchedulerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => SchedulerError::NotFound(id),
            other => SchedulerError::Store(other),
        }
    }
}

impl From<ScheduleError> for SchedulerError {
    fn from(err: ScheduleError) -> Self {
        SchedulerError::validation("schedule", err.to_string())
    }
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_not_found_maps_to_not_found() {
        let err: SchedulerError = StoreError::NotFound(7).into();
        assert!(matches!(err, SchedulerError::NotFound(7)));
    }

    #[test]
    fn test_store_database_maps_to_store() {
        let err: SchedulerError = StoreError::Database("disk full".to_string()).into();
        assert!(matches!(err, SchedulerError::Store(_)));
        assert!(err.to_string().contains("disk full"));
    }

    #[test]
    fn test_schedule_error_maps_to_validation() {
        let err: SchedulerError = ScheduleError::UnknownTimezone("Mars/Olympus".to_string()).into();
        match err {
            SchedulerError::Validation { field, message } => {
                assert_eq!(field, "schedule");
                assert!(message.contains("Mars/Olympus"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_registration_display() {
        let err = SchedulerError::from(RegistryError::DuplicateRegistration(3));
        assert_eq!(err.to_string(), "Job 3 already has an armed timer");
    }
}
