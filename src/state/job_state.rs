//! Job timer state and snapshot structures

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    NotStarted,
    Running,
    Paused,
    Completed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::NotStarted => "not_started",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Completed => "completed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ordered unit of work within a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub index: usize,
    pub label: String,
}

impl Step {
    /// Build the step list from labels, numbering them by position
    pub fn from_labels<I, S>(labels: I) -> Vec<Step>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        labels
            .into_iter()
            .enumerate()
            .map(|(index, label)| Step { index, label: label.into() })
            .collect()
    }
}

/// A pause period; `resumed_at` is `None` while the pause is still open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PauseInterval {
    pub paused_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resumed_at: Option<DateTime<Utc>>,
}

impl PauseInterval {
    pub fn open(paused_at: DateTime<Utc>) -> Self {
        Self { paused_at, resumed_at: None }
    }

    pub fn is_open(&self) -> bool {
        self.resumed_at.is_none()
    }

    /// Time spent paused up to `until`; open intervals count up to `until`
    pub fn duration_until(&self, until: DateTime<Utc>) -> Duration {
        let end = self.resumed_at.unwrap_or(until).min(until);
        (end - self.paused_at).max(Duration::zero())
    }
}

/// Full state of a started job. Also the persisted snapshot form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimerState {
    pub job_id: String,
    pub steps: Vec<Step>,
    pub current_step_index: usize,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub pause_intervals: Vec<PauseInterval>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Snapshots are immutable copies of the state handed to storage
pub type JobSnapshot = JobTimerState;

impl JobTimerState {
    /// Elapsed time excluding pauses, measured at `now` (or at completion once completed)
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let end = self.completed_at.unwrap_or(now);
        let paused: Duration = self
            .pause_intervals
            .iter()
            .map(|interval| interval.duration_until(end))
            .fold(Duration::zero(), |acc, d| acc + d);

        let active = (end - self.started_at) - paused;
        active.num_seconds().max(0) as u64
    }

    pub fn open_pause(&self) -> Option<&PauseInterval> {
        self.pause_intervals.last().filter(|interval| interval.is_open())
    }

    pub fn is_final_step(&self) -> bool {
        self.current_step_index + 1 == self.steps.len()
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step_index)
    }

    /// Latest timestamp recorded in the state
    pub fn last_timestamp(&self) -> DateTime<Utc> {
        let mut latest = self.started_at;
        for interval in &self.pause_intervals {
            latest = latest.max(interval.paused_at);
            if let Some(resumed_at) = interval.resumed_at {
                latest = latest.max(resumed_at);
            }
        }
        if let Some(completed_at) = self.completed_at {
            latest = latest.max(completed_at);
        }
        latest
    }

    /// Check every structural invariant, returning the first violation found
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.job_id.is_empty() {
            return Err("job id is empty".to_string());
        }
        if self.steps.is_empty() {
            return Err("job has no steps".to_string());
        }
        if let Some((position, step)) = self
            .steps
            .iter()
            .enumerate()
            .find(|(position, step)| step.index != *position)
        {
            return Err(format!(
                "step {:?} carries index {} at position {}",
                step.label, step.index, position
            ));
        }
        if self.current_step_index >= self.steps.len() {
            return Err(format!(
                "current step index {} out of range for {} steps",
                self.current_step_index,
                self.steps.len()
            ));
        }
        if self.status == JobStatus::NotStarted {
            return Err("snapshot of a job that was never started".to_string());
        }

        let open_count = self.pause_intervals.iter().filter(|i| i.is_open()).count();
        if open_count > 1 {
            return Err(format!("{} open pause intervals", open_count));
        }
        if open_count == 1 && !self.pause_intervals.last().map_or(false, |i| i.is_open()) {
            return Err("open pause interval is not the last one".to_string());
        }
        match (self.status, open_count) {
            (JobStatus::Paused, 0) => return Err("paused job has no open pause interval".to_string()),
            (JobStatus::Running | JobStatus::Completed, 1) => {
                return Err(format!("{} job has an open pause interval", self.status))
            }
            _ => {}
        }

        match (self.status, self.completed_at) {
            (JobStatus::Completed, None) => return Err("completed job has no completion time".to_string()),
            (status, Some(_)) if status != JobStatus::Completed => {
                return Err(format!("{} job has a completion time", status))
            }
            _ => {}
        }

        let mut previous = self.started_at;
        for interval in &self.pause_intervals {
            if interval.paused_at < previous {
                return Err("pause interval starts before the previous timestamp".to_string());
            }
            previous = interval.paused_at;
            if let Some(resumed_at) = interval.resumed_at {
                if resumed_at < previous {
                    return Err("pause interval resumes before it was paused".to_string());
                }
                previous = resumed_at;
            }
        }
        if let Some(completed_at) = self.completed_at {
            if completed_at < previous {
                return Err("completion time precedes earlier timestamps".to_string());
            }
        }

        Ok(())
    }
}

/// Snapshot plus the time figures derived from it at query time
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobView {
    #[serde(flatten)]
    pub state: JobTimerState,
    pub elapsed_seconds: u64,
    pub billable_seconds: u64,
    pub as_of: DateTime<Utc>,
}

impl JobView {
    pub fn at(state: JobTimerState, now: DateTime<Utc>) -> Self {
        let elapsed_seconds = state.elapsed_seconds(now);
        Self {
            state,
            elapsed_seconds,
            billable_seconds: elapsed_seconds,
            as_of: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::epoch_plus;

    fn running_state() -> JobTimerState {
        JobTimerState {
            job_id: "job-1".to_string(),
            steps: Step::from_labels(["A", "B", "C"]),
            current_step_index: 0,
            status: JobStatus::Running,
            started_at: epoch_plus(0),
            pause_intervals: Vec::new(),
            completed_at: None,
        }
    }

    #[test]
    fn steps_are_numbered_by_position() {
        let steps = Step::from_labels(["prep", "work"]);
        assert_eq!(steps[0], Step { index: 0, label: "prep".to_string() });
        assert_eq!(steps[1].index, 1);
    }

    #[test]
    fn elapsed_excludes_closed_and_open_pauses() {
        let mut state = running_state();
        state.pause_intervals.push(PauseInterval {
            paused_at: epoch_plus(10),
            resumed_at: Some(epoch_plus(20)),
        });
        assert_eq!(state.elapsed_seconds(epoch_plus(30)), 20);

        state.pause_intervals.push(PauseInterval::open(epoch_plus(30)));
        state.status = JobStatus::Paused;
        assert_eq!(state.elapsed_seconds(epoch_plus(100)), 20);
    }

    #[test]
    fn elapsed_before_start_is_zero() {
        let mut state = running_state();
        state.started_at = epoch_plus(50);
        assert_eq!(state.elapsed_seconds(epoch_plus(10)), 0);
    }

    #[test]
    fn completed_state_freezes_elapsed() {
        let mut state = running_state();
        state.status = JobStatus::Completed;
        state.current_step_index = 2;
        state.completed_at = Some(epoch_plus(45));
        assert_eq!(state.elapsed_seconds(epoch_plus(45)), 45);
        assert_eq!(state.elapsed_seconds(epoch_plus(9_000)), 45);
    }

    #[test]
    fn invariants_reject_out_of_range_index() {
        let mut state = running_state();
        state.current_step_index = 3;
        assert!(state.check_invariants().unwrap_err().contains("out of range"));
    }

    #[test]
    fn invariants_reject_completion_time_without_completed_status() {
        let mut state = running_state();
        state.completed_at = Some(epoch_plus(5));
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn invariants_reject_multiple_open_pauses() {
        let mut state = running_state();
        state.status = JobStatus::Paused;
        state.pause_intervals = vec![
            PauseInterval::open(epoch_plus(5)),
            PauseInterval::open(epoch_plus(6)),
        ];
        assert!(state.check_invariants().unwrap_err().contains("open pause"));
    }

    #[test]
    fn invariants_reject_time_going_backwards() {
        let mut state = running_state();
        state.pause_intervals.push(PauseInterval {
            paused_at: epoch_plus(20),
            resumed_at: Some(epoch_plus(15)),
        });
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn snapshot_json_uses_snake_case_status() {
        let json = serde_json::to_value(running_state()).unwrap();
        assert_eq!(json["status"], "running");
        assert_eq!(json["current_step_index"], 0);
        assert!(json.get("completed_at").is_none());
    }
}
