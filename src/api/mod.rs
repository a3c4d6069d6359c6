//! HTTP API module
//!
//! This module contains all HTTP endpoint handlers and response structures.

pub mod handlers;
pub mod responses;

use std::sync::Arc;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::state::AppState;
use handlers::*;

/// Create the HTTP router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/jobs", get(list_handler))
        .route("/jobs/:job_id", get(job_handler).delete(reset_handler))
        .route("/jobs/:job_id/start", post(start_handler))
        .route("/jobs/:job_id/advance", post(advance_handler))
        .route("/jobs/:job_id/pause", post(pause_handler))
        .route("/jobs/:job_id/resume", post(resume_handler))
        .route("/jobs/:job_id/complete", post(complete_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
