//! State management module
//!
//! This module contains the job timer model, its controller and the registry
//! that hosts one controller per job.

pub mod app_state;
pub mod controller;
pub mod job_state;

// Re-export main types
pub use app_state::AppState;
pub use controller::JobTimerController;
pub use job_state::{JobSnapshot, JobStatus, JobTimerState, JobView, PauseInterval, Step};
