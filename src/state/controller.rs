//! Job step/timer lifecycle controller
//!
//! ```text
//! NotStarted ──start──▶ Running ──pause──▶ Paused
//!                         ▲  │               │
//!                         │  └──resume◀──────┘
//!                         │
//!                    advance_step      complete (final step only)
//!                                  Running ──────────▶ Completed
//! ```
//!
//! The controller owns no I/O. Hosts persist the value returned by
//! [`JobTimerController::snapshot`] and serialize calls themselves.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::{
    clock::Clock,
    error::TimerError,
    services::AnalyticsSink,
};
use super::job_state::{JobSnapshot, JobStatus, JobTimerState, PauseInterval, Step};

/// Controller for a single job's step progression and billable time
pub struct JobTimerController {
    state: Option<JobTimerState>,
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsSink>,
}

impl std::fmt::Debug for JobTimerController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobTimerController")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl JobTimerController {
    /// Create an unstarted controller
    pub fn new(clock: Arc<dyn Clock>, analytics: Arc<dyn AnalyticsSink>) -> Self {
        Self {
            state: None,
            clock,
            analytics,
        }
    }

    /// Rebuild a controller from a stored snapshot, rejecting any that break an invariant
    pub fn restore(
        snapshot: JobSnapshot,
        clock: Arc<dyn Clock>,
        analytics: Arc<dyn AnalyticsSink>,
    ) -> Result<Self, TimerError> {
        snapshot.check_invariants().map_err(TimerError::CorruptState)?;
        debug!(
            "Restored job {} at step {} ({})",
            snapshot.job_id, snapshot.current_step_index, snapshot.status
        );
        Ok(Self {
            state: Some(snapshot),
            clock,
            analytics,
        })
    }

    pub fn status(&self) -> JobStatus {
        self.state.as_ref().map_or(JobStatus::NotStarted, |s| s.status)
    }

    pub fn job_id(&self) -> Option<&str> {
        self.state.as_ref().map(|s| s.job_id.as_str())
    }

    pub fn current_step_index(&self) -> Option<usize> {
        self.state.as_ref().map(|s| s.current_step_index)
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.state.as_ref().and_then(|s| s.current_step())
    }

    pub fn steps(&self) -> &[Step] {
        match &self.state {
            Some(state) => &state.steps,
            None => &[],
        }
    }

    /// Begin tracking a job on its first step
    pub fn start(&mut self, job_id: impl Into<String>, steps: Vec<Step>) -> Result<(), TimerError> {
        if self.state.is_some() {
            return Err(self.invalid("start"));
        }
        if steps.is_empty() {
            return Err(TimerError::NoSteps);
        }

        let job_id = job_id.into();
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, step)| Step { index, label: step.label })
            .collect();

        let now = self.clock.now();
        debug!("Starting job {} at {}", job_id, now);
        self.state = Some(JobTimerState {
            job_id,
            steps,
            current_step_index: 0,
            status: JobStatus::Running,
            started_at: now,
            pause_intervals: Vec::new(),
            completed_at: None,
        });
        Ok(())
    }

    /// Move to the next step. Completion goes through [`Self::complete`].
    pub fn advance_step(&mut self) -> Result<usize, TimerError> {
        let state = self.running_state("advance step")?;
        if state.is_final_step() {
            return Err(TimerError::FinalStepReached {
                last_index: state.current_step_index,
            });
        }

        state.current_step_index += 1;
        let job_id = state.job_id.clone();
        let index = state.current_step_index;
        debug!("Job {} advanced to step {}", job_id, index);

        self.analytics.record_step_change(&job_id, index);
        Ok(index)
    }

    pub fn pause(&mut self) -> Result<(), TimerError> {
        let now = self.now_after_last("pause")?;
        let state = self.running_state("pause")?;
        state.pause_intervals.push(PauseInterval::open(now));
        state.status = JobStatus::Paused;
        debug!("Job {} paused at {}", state.job_id, now);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), TimerError> {
        if self.status() != JobStatus::Paused {
            return Err(self.invalid("resume"));
        }
        let now = self.now_after_last("resume")?;
        let Some(state) = self.state.as_mut() else {
            return Err(TimerError::InvalidState {
                operation: "resume",
                status: JobStatus::NotStarted,
            });
        };
        let Some(interval) = state.pause_intervals.last_mut().filter(|i| i.is_open()) else {
            return Err(TimerError::InvalidState {
                operation: "resume",
                status: state.status,
            });
        };

        interval.resumed_at = Some(now);
        state.status = JobStatus::Running;
        debug!("Job {} resumed at {}", state.job_id, now);
        Ok(())
    }

    /// Finish the job; only allowed while running on the final step
    pub fn complete(&mut self) -> Result<u64, TimerError> {
        let now = self.now_after_last("complete")?;
        let state = self.running_state("complete")?;
        if !state.is_final_step() {
            return Err(TimerError::NotOnFinalStep {
                current: state.current_step_index,
                total: state.steps.len(),
            });
        }

        if let Some(open) = state.pause_intervals.last_mut().filter(|i| i.is_open()) {
            warn!("Job {} had an open pause while running, closing it", state.job_id);
            open.resumed_at = Some(now);
        }
        state.status = JobStatus::Completed;
        state.completed_at = Some(now);

        let billable = state.elapsed_seconds(now);
        let job_id = state.job_id.clone();
        debug!("Job {} completed with {}s billable", job_id, billable);

        self.analytics.record_completion(&job_id, billable);
        Ok(billable)
    }

    /// Drop all state and return to not-started
    pub fn reset(&mut self) {
        if let Some(state) = self.state.take() {
            debug!("Reset job {} from {}", state.job_id, state.status);
        }
    }

    /// Active time since start, excluding pauses. Zero before start.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.state.as_ref().map_or(0, |s| s.elapsed_seconds(now))
    }

    /// Pause time is never billed, so this equals [`Self::elapsed_seconds`]
    pub fn billable_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.elapsed_seconds(now)
    }

    /// Copy of the current state for persistence; `None` until started
    pub fn snapshot(&self) -> Option<JobSnapshot> {
        self.state.clone()
    }

    fn invalid(&self, operation: &'static str) -> TimerError {
        TimerError::InvalidState {
            operation,
            status: self.status(),
        }
    }

    fn running_state(&mut self, operation: &'static str) -> Result<&mut JobTimerState, TimerError> {
        let status = self.status();
        match self.state.as_mut() {
            Some(state) if state.status == JobStatus::Running => Ok(state),
            _ => Err(TimerError::InvalidState { operation, status }),
        }
    }

    /// Current clock reading, held at the last recorded timestamp if the clock went backwards
    fn now_after_last(&self, operation: &'static str) -> Result<DateTime<Utc>, TimerError> {
        let state = self.state.as_ref().ok_or_else(|| self.invalid(operation))?;
        let now = self.clock.now();
        let last = state.last_timestamp();
        if now < last {
            warn!(
                "Clock went backwards for job {} ({} < {}), using last timestamp",
                state.job_id, now, last
            );
            return Ok(last);
        }
        Ok(now)
    }
}
