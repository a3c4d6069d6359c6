//! Background tasks module
//!
//! This module contains background tasks that run alongside the HTTP server.

pub mod analytics_recorder;
pub mod snapshot_restore;

// Re-export main functions
pub use analytics_recorder::analytics_recorder_task;
pub use snapshot_restore::snapshot_restore_task;
