//! Analytics sink for job step changes and completions

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use crate::clock::Clock;

/// Best-effort receiver of job events. Implementations must not block or fail the caller.
pub trait AnalyticsSink: Send + Sync {
    fn record_step_change(&self, job_id: &str, step_index: usize);
    fn record_completion(&self, job_id: &str, billable_seconds: u64);
}

/// Event forwarded to the analytics recorder task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AnalyticsEvent {
    StepChanged {
        job_id: String,
        step_index: usize,
        at: DateTime<Utc>,
    },
    Completed {
        job_id: String,
        billable_seconds: u64,
        at: DateTime<Utc>,
    },
}

impl AnalyticsEvent {
    pub fn job_id(&self) -> &str {
        match self {
            AnalyticsEvent::StepChanged { job_id, .. } | AnalyticsEvent::Completed { job_id, .. } => job_id,
        }
    }
}

/// Sink that hands events to a bounded channel without waiting.
/// Events are stamped with the same clock the controllers use.
#[derive(Clone)]
pub struct ChannelAnalytics {
    tx: mpsc::Sender<AnalyticsEvent>,
    clock: Arc<dyn Clock>,
}

impl ChannelAnalytics {
    /// Create the sink together with the receiver the recorder task drains
    pub fn channel(capacity: usize, clock: Arc<dyn Clock>) -> (Self, mpsc::Receiver<AnalyticsEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx, clock }, rx)
    }

    fn send(&self, event: AnalyticsEvent) {
        if let Err(e) = self.tx.try_send(event) {
            warn!("Dropping analytics event: {}", e);
        }
    }
}

impl AnalyticsSink for ChannelAnalytics {
    fn record_step_change(&self, job_id: &str, step_index: usize) {
        self.send(AnalyticsEvent::StepChanged {
            job_id: job_id.to_string(),
            step_index,
            at: self.clock.now(),
        });
    }

    fn record_completion(&self, job_id: &str, billable_seconds: u64) {
        self.send(AnalyticsEvent::Completed {
            job_id: job_id.to_string(),
            billable_seconds,
            at: self.clock.now(),
        });
    }
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAnalytics;

impl AnalyticsSink for NoopAnalytics {
    fn record_step_change(&self, _job_id: &str, _step_index: usize) {}

    fn record_completion(&self, _job_id: &str, _billable_seconds: u64) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{epoch_plus, ManualClock};

    #[tokio::test]
    async fn channel_sink_forwards_events() {
        let clock = Arc::new(ManualClock::new(epoch_plus(30)));
        let (sink, mut rx) = ChannelAnalytics::channel(4, clock.clone());
        sink.record_step_change("job-1", 1);
        clock.advance_secs(5);
        sink.record_completion("job-1", 90);

        match rx.recv().await.unwrap() {
            AnalyticsEvent::StepChanged { job_id, step_index, at } => {
                assert_eq!(job_id, "job-1");
                assert_eq!(step_index, 1);
                assert_eq!(at, epoch_plus(30));
            }
            other => panic!("unexpected event {:?}", other),
        }
        match rx.recv().await.unwrap() {
            AnalyticsEvent::Completed { billable_seconds, at, .. } => {
                assert_eq!(billable_seconds, 90);
                assert_eq!(at, epoch_plus(35));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn full_or_closed_channel_is_swallowed() {
        let (sink, rx) = ChannelAnalytics::channel(1, Arc::new(ManualClock::at_epoch()));
        sink.record_step_change("job-1", 1);
        sink.record_step_change("job-1", 2);
        drop(rx);
        sink.record_completion("job-1", 10);
    }

    #[test]
    fn events_serialize_with_tag() {
        let event = AnalyticsEvent::Completed {
            job_id: "job-9".to_string(),
            billable_seconds: 12,
            at: DateTime::<Utc>::UNIX_EPOCH,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "completed");
        assert_eq!(json["billable_seconds"], 12);
        assert_eq!(event.job_id(), "job-9");
    }
}
