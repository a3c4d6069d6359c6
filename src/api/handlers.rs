//! HTTP endpoint handlers

use std::sync::Arc;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::Json,
};
use chrono::Utc;
use tracing::info;

use crate::state::AppState;
use super::responses::{ApiError, HealthResponse, JobListResponse, JobResponse, StartJobRequest};

type JobResult = Result<Json<JobResponse>, ApiError>;

/// Handle POST /jobs/:job_id/start
pub async fn start_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
    body: Result<Json<StartJobRequest>, JsonRejection>,
) -> JobResult {
    let Json(request) = body?;
    let view = state.start_job(&job_id, request.steps).await?;
    info!("Job {} started", job_id);
    Ok(Json(JobResponse::new("start", view)))
}

/// Handle POST /jobs/:job_id/advance
pub async fn advance_handler(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> JobResult {
    let view = state.advance_step(&job_id).await?;
    info!("Job {} advanced to step {}", job_id, view.state.current_step_index);
    Ok(Json(JobResponse::new("advance", view)))
}

/// Handle POST /jobs/:job_id/pause
pub async fn pause_handler(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> JobResult {
    let view = state.pause_job(&job_id).await?;
    info!("Job {} paused", job_id);
    Ok(Json(JobResponse::new("pause", view)))
}

/// Handle POST /jobs/:job_id/resume
pub async fn resume_handler(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> JobResult {
    let view = state.resume_job(&job_id).await?;
    info!("Job {} resumed", job_id);
    Ok(Json(JobResponse::new("resume", view)))
}

/// Handle POST /jobs/:job_id/complete
pub async fn complete_handler(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> JobResult {
    let view = state.complete_job(&job_id).await?;
    info!("Job {} completed with {}s billable", job_id, view.billable_seconds);
    Ok(Json(JobResponse::new("complete", view)))
}

/// Handle DELETE /jobs/:job_id - discard the job and its snapshot
pub async fn reset_handler(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.reset_job(&job_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Handle GET /jobs/:job_id
pub async fn job_handler(State(state): State<Arc<AppState>>, Path(job_id): Path<String>) -> JobResult {
    let view = state.job_view(&job_id).await?;
    Ok(Json(JobResponse::new("view", view)))
}

/// Handle GET /jobs
pub async fn list_handler(State(state): State<Arc<AppState>>) -> Result<Json<JobListResponse>, ApiError> {
    let jobs = state.list_jobs().await?;
    Ok(Json(JobListResponse { jobs }))
}

/// Handle GET /health - Health check endpoint
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let (last_action, last_action_time) = state.get_last_action();
    Json(HealthResponse {
        status: "ok".to_string(),
        timestamp: Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime: state.get_uptime(),
        host: state.host.clone(),
        port: state.port,
        jobs: state.job_count().await,
        last_action,
        last_action_time,
    })
}
