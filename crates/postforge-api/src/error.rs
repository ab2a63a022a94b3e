//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use postforge_scheduler::SchedulerError;

/// Errors surfaced by request handlers.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A scheduler operation failed.
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    /// Caller lacks the operator credential.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Scheduler(SchedulerError::Validation { .. }) => StatusCode::BAD_REQUEST,
            ApiError::Scheduler(SchedulerError::NotFound(_)) => StatusCode::NOT_FOUND,
            ApiError::Scheduler(SchedulerError::Unauthorized(_)) => StatusCode::FORBIDDEN,
            ApiError::Scheduler(SchedulerError::Registry(_))
            | ApiError::Scheduler(SchedulerError::Store(_))
            | ApiError::Scheduler(SchedulerError::Config(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        }
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postforge_scheduler::{AuthorizationError, SourceDescriptor, StoreError};

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::from(SchedulerError::validation("name", "must not be empty")),
                StatusCode::BAD_REQUEST,
            ),
            (ApiError::from(SchedulerError::NotFound(3)), StatusCode::NOT_FOUND),
            (
                ApiError::from(SchedulerError::from(AuthorizationError {
                    reason: "source 'cron-bot' is not recognized".to_string(),
                    descriptor: SourceDescriptor::external(Some("cron-bot".to_string()), false),
                })),
                StatusCode::FORBIDDEN,
            ),
            (
                ApiError::from(SchedulerError::from(StoreError::Database("locked".to_string()))),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::Forbidden("operator credential required".to_string()),
                StatusCode::FORBIDDEN,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.status(), expected, "{}", err);
        }
    }
}
