//! Error types

use std::path::PathBuf;

use thiserror::Error;

use crate::state::JobStatus;

/// Errors raised by a job controller. State is left untouched whenever one is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TimerError {
    #[error("cannot {operation} while job is {status}")]
    InvalidState {
        operation: &'static str,
        status: JobStatus,
    },
    #[error("cannot advance past the final step ({last_index})")]
    FinalStepReached { last_index: usize },
    #[error("cannot complete on step {current} of {total}; the final step has not been reached")]
    NotOnFinalStep { current: usize, total: usize },
    #[error("a job needs at least one step")]
    NoSteps,
    #[error("corrupt snapshot: {0}")]
    CorruptState(String),
}

impl TimerError {
    /// True for the transition-precondition failures (the recoverable kind)
    pub fn is_invalid_state(&self) -> bool {
        matches!(
            self,
            TimerError::InvalidState { .. }
                | TimerError::FinalStepReached { .. }
                | TimerError::NotOnFinalStep { .. }
        )
    }

    pub fn is_corrupt_state(&self) -> bool {
        matches!(self, TimerError::CorruptState(_))
    }
}

/// Snapshot store failures
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("snapshot io failed for {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("snapshot json invalid for {path:?}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Errors surfaced by the job registry
#[derive(Debug, Error)]
pub enum AppError {
    #[error("job not found: {0}")]
    JobNotFound(String),
    #[error(transparent)]
    Timer(#[from] TimerError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("failed to lock job registry: {0}")]
    Lock(String),
}
