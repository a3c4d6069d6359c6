//! API request and response structures

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::{
    error::{AppError, TimerError},
    state::JobView,
};

/// Body of `POST /jobs/:job_id/start`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartJobRequest {
    pub steps: Vec<String>,
}

/// Response for every job transition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResponse {
    pub action: String,
    pub timestamp: DateTime<Utc>,
    pub job: JobView,
}

impl JobResponse {
    pub fn new(action: &str, job: JobView) -> Self {
        Self {
            action: action.to_string(),
            timestamp: Utc::now(),
            job,
        }
    }
}

/// Response for `GET /jobs`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListResponse {
    pub jobs: Vec<JobView>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime: String,
    pub host: String,
    pub port: u16,
    pub jobs: usize,
    pub last_action: Option<String>,
    pub last_action_time: Option<DateTime<Utc>>,
}

/// JSON error body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Error type returned by handlers
#[derive(Debug)]
pub enum ApiError {
    App(AppError),
    /// Request body missing or not matching the expected JSON
    BadBody(JsonRejection),
}

impl From<AppError> for ApiError {
    fn from(e: AppError) -> Self {
        Self::App(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        Self::BadBody(e)
    }
}

impl ApiError {
    fn status_and_kind(&self) -> (StatusCode, &'static str) {
        let app_error = match self {
            ApiError::App(e) => e,
            ApiError::BadBody(rejection) => return (rejection.status(), "invalid_body"),
        };
        match app_error {
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, "job_not_found"),
            AppError::Timer(TimerError::NoSteps) => (StatusCode::BAD_REQUEST, "no_steps"),
            AppError::Timer(TimerError::CorruptState(_)) => (StatusCode::UNPROCESSABLE_ENTITY, "corrupt_state"),
            AppError::Timer(_) => (StatusCode::CONFLICT, "invalid_state"),
            AppError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            AppError::Lock(_) => (StatusCode::INTERNAL_SERVER_ERROR, "lock_error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = self.status_and_kind();
        let message = match &self {
            ApiError::App(e) => e.to_string(),
            ApiError::BadBody(rejection) => rejection.body_text(),
        };
        if status.is_server_error() {
            error!("Request failed: {}", message);
        } else {
            warn!("Request rejected: {}", message);
        }

        let body = ErrorResponse {
            error: kind.to_string(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::JobStatus;

    #[test]
    fn timer_errors_map_to_client_statuses() {
        let invalid = ApiError::App(AppError::Timer(TimerError::InvalidState {
            operation: "pause",
            status: JobStatus::Completed,
        }));
        assert_eq!(invalid.status_and_kind(), (StatusCode::CONFLICT, "invalid_state"));

        let final_step = ApiError::App(AppError::Timer(TimerError::NotOnFinalStep { current: 1, total: 3 }));
        assert_eq!(final_step.status_and_kind().0, StatusCode::CONFLICT);

        let empty = ApiError::App(AppError::Timer(TimerError::NoSteps));
        assert_eq!(empty.status_and_kind().0, StatusCode::BAD_REQUEST);

        let missing = ApiError::App(AppError::JobNotFound("x".to_string()));
        assert_eq!(missing.into_response().status(), StatusCode::NOT_FOUND);
    }
}
