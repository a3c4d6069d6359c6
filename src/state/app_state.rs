//! Process-wide registry of job controllers

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
    time::Instant,
};
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, Mutex as AsyncMutex};
use tracing::{debug, error, info, warn};

use crate::{
    clock::Clock,
    error::{AppError, TimerError},
    services::{AnalyticsSink, SnapshotStore},
    utils::bounded,
};
use super::{JobSnapshot, JobStatus, JobTimerController, JobView, Step};

/// One job's controller. The lock is held across transition, save and broadcast,
/// so snapshots of a job reach the store in transition order.
type JobSlot = Arc<AsyncMutex<JobTimerController>>;

/// Main application state: one controller per job plus its collaborators
pub struct AppState {
    /// Slots keyed by job id. Slots are never removed; a reset job keeps an unstarted controller.
    controllers: Mutex<HashMap<String, JobSlot>>,
    store: Arc<dyn SnapshotStore>,
    clock: Arc<dyn Clock>,
    analytics: Arc<dyn AnalyticsSink>,
    /// Server metadata
    pub start_time: Instant,
    pub port: u16,
    pub host: String,
    /// Last action tracking
    last_action: Mutex<Option<(String, DateTime<Utc>)>>,
    /// Job views published after every change
    view_tx: broadcast::Sender<JobView>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn SnapshotStore>,
        clock: Arc<dyn Clock>,
        analytics: Arc<dyn AnalyticsSink>,
        port: u16,
        host: String,
    ) -> Self {
        let (view_tx, _) = broadcast::channel(100);

        Self {
            controllers: Mutex::new(HashMap::new()),
            store,
            clock,
            analytics,
            start_time: Instant::now(),
            port,
            host,
            last_action: Mutex::new(None),
            view_tx,
        }
    }

    /// Subscribe to job views published after each change
    pub fn subscribe(&self) -> broadcast::Receiver<JobView> {
        self.view_tx.subscribe()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn slot(&self, job_id: &str) -> Result<Option<JobSlot>, AppError> {
        let controllers = self
            .controllers
            .lock()
            .map_err(|e| AppError::Lock(e.to_string()))?;
        Ok(controllers.get(job_id).cloned())
    }

    fn slot_or_insert(&self, job_id: &str) -> Result<JobSlot, AppError> {
        let mut controllers = self
            .controllers
            .lock()
            .map_err(|e| AppError::Lock(e.to_string()))?;
        let slot = controllers.entry(job_id.to_string()).or_insert_with(|| {
            Arc::new(AsyncMutex::new(JobTimerController::new(
                self.clock.clone(),
                self.analytics.clone(),
            )))
        });
        Ok(Arc::clone(slot))
    }

    fn all_slots(&self) -> Result<Vec<JobSlot>, AppError> {
        let controllers = self
            .controllers
            .lock()
            .map_err(|e| AppError::Lock(e.to_string()))?;
        Ok(controllers.values().cloned().collect())
    }

    /// Start tracking `job_id` with the given step labels
    pub async fn start_job(&self, job_id: &str, labels: Vec<String>) -> Result<JobView, AppError> {
        info!("Starting job {} with {} steps", job_id, labels.len());
        let slot = self.slot_or_insert(job_id)?;
        let mut controller = slot.lock().await;
        controller.start(job_id, Step::from_labels(labels))?;
        self.publish("start", job_id, controller.snapshot()).await
    }

    pub async fn advance_step(&self, job_id: &str) -> Result<JobView, AppError> {
        self.transition("advance", job_id, |c| c.advance_step().map(|_| ())).await
    }

    pub async fn pause_job(&self, job_id: &str) -> Result<JobView, AppError> {
        self.transition("pause", job_id, JobTimerController::pause).await
    }

    pub async fn resume_job(&self, job_id: &str) -> Result<JobView, AppError> {
        self.transition("resume", job_id, JobTimerController::resume).await
    }

    pub async fn complete_job(&self, job_id: &str) -> Result<JobView, AppError> {
        self.transition("complete", job_id, |c| c.complete().map(|_| ())).await
    }

    /// Discard the job's controller state and its stored snapshot
    pub async fn reset_job(&self, job_id: &str) -> Result<(), AppError> {
        let slot = self
            .slot(job_id)?
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        let mut controller = slot.lock().await;
        if controller.status() == JobStatus::NotStarted {
            return Err(AppError::JobNotFound(job_id.to_string()));
        }

        self.store.remove(job_id).await?;
        controller.reset();
        self.record_action("reset", job_id);
        info!("Job {} reset", job_id);
        Ok(())
    }

    /// Current view of one job
    pub async fn job_view(&self, job_id: &str) -> Result<JobView, AppError> {
        let slot = self
            .slot(job_id)?
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        let snapshot = slot.lock().await.snapshot();
        snapshot
            .map(|snapshot| JobView::at(snapshot, self.clock.now()))
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))
    }

    /// Views of every started job, ordered by job id
    pub async fn list_jobs(&self) -> Result<Vec<JobView>, AppError> {
        let mut snapshots = Vec::new();
        for slot in self.all_slots()? {
            if let Some(snapshot) = slot.lock().await.snapshot() {
                snapshots.push(snapshot);
            }
        }

        let now = self.clock.now();
        let mut views: Vec<JobView> = snapshots
            .into_iter()
            .map(|snapshot| JobView::at(snapshot, now))
            .collect();
        views.sort_by(|a, b| a.state.job_id.cmp(&b.state.job_id));
        Ok(views)
    }

    /// Number of started jobs
    pub async fn job_count(&self) -> usize {
        let mut count = 0;
        for slot in self.all_slots().unwrap_or_default() {
            if slot.lock().await.status() != JobStatus::NotStarted {
                count += 1;
            }
        }
        count
    }

    /// Install a controller rebuilt from a stored snapshot
    pub async fn restore_snapshot(&self, snapshot: JobSnapshot) -> Result<(), AppError> {
        let job_id = snapshot.job_id.clone();
        debug!("Restoring snapshot {}", bounded(&snapshot));
        let restored = JobTimerController::restore(snapshot, self.clock.clone(), self.analytics.clone())?;

        let slot = self.slot_or_insert(&job_id)?;
        let mut controller = slot.lock().await;
        if controller.status() != JobStatus::NotStarted {
            warn!("Job {} already tracked, replacing with restored snapshot", job_id);
        }
        *controller = restored;
        Ok(())
    }

    /// Load every snapshot from the store; corrupt ones are dropped from it
    pub async fn restore_all(&self) -> Result<usize, AppError> {
        let mut restored = 0;
        for key in self.store.list().await? {
            let snapshot = match self.store.load(&key).await {
                Ok(Some(snapshot)) => snapshot,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Discarding unreadable snapshot {}: {}", key, e);
                    self.store.remove(&key).await?;
                    continue;
                }
            };
            if snapshot.job_id != key {
                warn!("Discarding snapshot stored under {} for job {}", key, snapshot.job_id);
                self.store.remove(&key).await?;
                continue;
            }

            match self.restore_snapshot(snapshot).await {
                Ok(()) => restored += 1,
                Err(AppError::Timer(e @ TimerError::CorruptState(_))) => {
                    warn!("Discarding snapshot {}: {}", key, e);
                    self.store.remove(&key).await?;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(restored)
    }

    /// Calculate server uptime as a formatted string
    pub fn get_uptime(&self) -> String {
        let duration = self.start_time.elapsed();
        let hours = duration.as_secs() / 3600;
        let minutes = (duration.as_secs() % 3600) / 60;
        let seconds = duration.as_secs() % 60;

        if hours > 0 {
            format!("{}h {}m {}s", hours, minutes, seconds)
        } else if minutes > 0 {
            format!("{}m {}s", minutes, seconds)
        } else {
            format!("{}s", seconds)
        }
    }

    /// Get last action information as `"<action> <job_id>"` and its time
    pub fn get_last_action(&self) -> (Option<String>, Option<DateTime<Utc>>) {
        match self.last_action.lock().ok().and_then(|a| a.clone()) {
            Some((action, at)) => (Some(action), Some(at)),
            None => (None, None),
        }
    }

    /// Run one transition on a started job, then persist and publish while still holding its lock
    async fn transition<F>(&self, action: &str, job_id: &str, apply: F) -> Result<JobView, AppError>
    where
        F: FnOnce(&mut JobTimerController) -> Result<(), TimerError>,
    {
        let slot = self
            .slot(job_id)?
            .ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;
        let mut controller = slot.lock().await;
        if controller.status() == JobStatus::NotStarted {
            return Err(AppError::JobNotFound(job_id.to_string()));
        }

        apply(&mut *controller)?;
        self.publish(action, job_id, controller.snapshot()).await
    }

    /// Persist and broadcast a snapshot produced by a successful transition
    async fn publish(&self, action: &str, job_id: &str, snapshot: Option<JobSnapshot>) -> Result<JobView, AppError> {
        let snapshot = snapshot.ok_or_else(|| AppError::JobNotFound(job_id.to_string()))?;

        // The transition already happened; a failed save is reported but not undone.
        if let Err(e) = self.store.save(job_id, &snapshot).await {
            error!("Failed to persist snapshot for job {}: {}", job_id, e);
        }

        self.record_action(action, job_id);
        let view = JobView::at(snapshot, self.clock.now());
        if let Err(e) = self.view_tx.send(view.clone()) {
            debug!("No view subscribers for job {}: {}", job_id, e);
        }
        Ok(view)
    }

    fn record_action(&self, action: &str, job_id: &str) {
        if let Ok(mut last_action) = self.last_action.lock() {
            *last_action = Some((format!("{} {}", action, job_id), self.clock.now()));
        }
    }
}
