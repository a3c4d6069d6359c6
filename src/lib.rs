//! Job Timer - step progression and billable-time tracking for jobs
//!
//! This library provides the job timer controller (ordered steps, pause/resume,
//! completion gating, billable seconds) together with the HTTP service that
//! hosts one controller per job and persists their snapshots.

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod services;
pub mod state;
pub mod tasks;
pub mod utils;

// Re-export commonly used types
pub use api::create_router;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{AppError, StoreError, TimerError};
pub use state::{AppState, JobSnapshot, JobStatus, JobTimerController, JobView, Step};
pub use utils::signals::shutdown_signal;
