use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, instrument};

use super::{generators::Clock, repository::RefreshTokenRepository};

/// Configuration for the cleanup task
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    /// How often to run the cleanup task
    pub cleanup_interval: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            cleanup_interval: Duration::from_secs(30 * 60), // 30 minutes
        }
    }
}

/// Starts the background task that periodically deletes expired refresh token records
#[instrument(skip(repository, clock))]
pub async fn start_cleanup_task(
    repository: Arc<dyn RefreshTokenRepository + Send + Sync>,
    clock: Arc<dyn Clock>,
    config: CleanupConfig,
) {
    info!(
        cleanup_interval_secs = config.cleanup_interval.as_secs(),
        "Starting refresh token cleanup background task"
    );

    let mut cleanup_interval = interval(config.cleanup_interval);

    loop {
        cleanup_interval.tick().await;
        run_cleanup(repository.as_ref(), clock.as_ref()).await;
    }
}

/// One cleanup pass; failures are logged and retried on the next tick
pub async fn run_cleanup(
    repository: &(dyn RefreshTokenRepository + Send + Sync),
    clock: &dyn Clock,
) -> u64 {
    match repository.cleanup_expired(clock.now()).await {
        Ok(removed) => {
            info!(removed_count = removed, "Refresh token cleanup completed");
            removed
        }
        Err(e) => {
            error!(error = %e, "Refresh token cleanup failed");
            0
        }
    }
}
