//! Analytics recorder background task

use std::path::{Path, PathBuf};

use tokio::{fs::OpenOptions, io::AsyncWriteExt, sync::mpsc};
use tracing::{debug, info, warn};

use crate::services::AnalyticsEvent;

/// Drain analytics events, logging each and optionally appending it to a JSONL export.
/// Returns once every sender is dropped, with the number of events seen.
pub async fn analytics_recorder_task(
    mut rx: mpsc::Receiver<AnalyticsEvent>,
    export_path: Option<PathBuf>,
) -> usize {
    info!("Starting analytics recorder task");
    let mut recorded = 0;

    while let Some(event) = rx.recv().await {
        recorded += 1;
        match &event {
            AnalyticsEvent::StepChanged { job_id, step_index, .. } => {
                info!(job_id = %job_id, step_index, "Job step changed");
            }
            AnalyticsEvent::Completed { job_id, billable_seconds, .. } => {
                info!(job_id = %job_id, billable_seconds, "Job completed");
            }
        }

        if let Some(path) = &export_path {
            if let Err(e) = append_event(path, &event).await {
                warn!("Failed to export analytics event for job {}: {}", event.job_id(), e);
            }
        }
    }

    debug!("Analytics channel closed after {} events", recorded);
    recorded
}

async fn append_event(path: &Path, event: &AnalyticsEvent) -> anyhow::Result<()> {
    let mut line = serde_json::to_vec(event)?;
    line.push(b'\n');

    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(&line).await?;
    file.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::clock::SystemClock;
    use crate::services::{AnalyticsSink, ChannelAnalytics};

    #[tokio::test]
    async fn recorder_exports_events_as_json_lines() {
        let path = std::env::temp_dir().join(format!("job-timer-analytics-{}.jsonl", uuid::Uuid::new_v4()));
        let (sink, rx) = ChannelAnalytics::channel(8, Arc::new(SystemClock));
        let task = tokio::spawn(analytics_recorder_task(rx, Some(path.clone())));

        sink.record_step_change("job-1", 1);
        sink.record_completion("job-1", 42);
        drop(sink);

        assert_eq!(task.await.unwrap(), 2);
        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["event"], "step_changed");
        assert_eq!(lines[1]["billable_seconds"], 42);

        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn recorder_without_export_only_counts() {
        let (sink, rx) = ChannelAnalytics::channel(8, Arc::new(SystemClock));
        sink.record_step_change("job-1", 1);
        drop(sink);
        assert_eq!(analytics_recorder_task(rx, None).await, 1);
    }
}
