//! Job Timer - step progression and billable-time tracking service
//!
//! This is the main entry point for the job-timer application.

use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tracing::info;

use job_timer::{
    api::create_router,
    clock::SystemClock,
    config::Config,
    services::{ChannelAnalytics, FileSnapshotStore, MemorySnapshotStore, SnapshotStore},
    state::AppState,
    tasks::{analytics_recorder_task, snapshot_restore_task},
    utils::shutdown_signal,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();

    // Single subscriber for the whole process
    tracing_subscriber::fmt()
        .with_env_filter(format!("job_timer={},tower_http=info", config.log_level()))
        .init();

    info!("Starting job-timer server v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "Configuration: host={}, port={}, data_dir={:?}, memory_store={}",
        config.host, config.port, config.data_dir, config.memory_store
    );

    let store: Arc<dyn SnapshotStore> = if config.memory_store {
        Arc::new(MemorySnapshotStore::new())
    } else {
        Arc::new(FileSnapshotStore::new(config.data_dir.clone()))
    };

    // Analytics events flow through a channel so transitions never wait on them
    let clock = Arc::new(SystemClock);
    let (analytics, analytics_rx) = ChannelAnalytics::channel(config.analytics_buffer, clock.clone());
    let recorder = tokio::spawn(analytics_recorder_task(analytics_rx, config.analytics_log.clone()));

    let state = Arc::new(AppState::new(
        store,
        clock,
        Arc::new(analytics),
        config.port,
        config.host.clone(),
    ));

    snapshot_restore_task(Arc::clone(&state)).await;

    let app = create_router(Arc::clone(&state));

    let addr = config.address();
    let listener = TcpListener::bind(&addr).await?;

    info!("Server running on http://{}", addr);
    info!("Endpoints:");
    info!("  POST   /jobs/:job_id/start    - Start a job with its steps");
    info!("  POST   /jobs/:job_id/advance  - Move to the next step");
    info!("  POST   /jobs/:job_id/pause    - Pause the job timer");
    info!("  POST   /jobs/:job_id/resume   - Resume the job timer");
    info!("  POST   /jobs/:job_id/complete - Complete the job on its final step");
    info!("  DELETE /jobs/:job_id          - Discard the job");
    info!("  GET    /jobs[/:job_id]        - Job status and billable time");
    info!("  GET    /health                - Health check");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("Shutdown signal received");

    // Dropping the last sink closes the channel and lets the recorder drain
    drop(state);
    match tokio::time::timeout(Duration::from_secs(5), recorder).await {
        Ok(Ok(count)) => info!("Analytics recorder stopped after {} events", count),
        Ok(Err(e)) => tracing::error!("Analytics recorder failed: {}", e),
        Err(_) => tracing::warn!("Analytics recorder did not drain in time"),
    }

    info!("Server shutdown complete");
    Ok(())
}
