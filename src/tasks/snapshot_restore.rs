//! Startup restore of persisted job snapshots

use std::sync::Arc;

use tracing::{error, info};

use crate::state::AppState;

/// Reload every stored job into the registry before the server accepts requests
pub async fn snapshot_restore_task(state: Arc<AppState>) {
    info!("Restoring persisted job snapshots");

    match state.restore_all().await {
        Ok(0) => info!("No job snapshots to restore"),
        Ok(count) => info!("Restored {} job(s)", count),
        Err(e) => error!("Snapshot restore failed: {}", e),
    }
}
