//! Utility functions module
//!
//! This module contains utility functions used throughout the application.

pub mod log_format;
pub mod signals;

// Re-export main functions
pub use log_format::bounded;
pub use signals::shutdown_signal;
