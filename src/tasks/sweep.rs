//! Expired-Record Sweep Task
//!
//! Expiration is lazy by default: an expired record keeps its storage until
//! it is next read. This task is the opt-in eager alternative.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::Cache;

/// Spawns a task that calls `Cache::purge_expired` every `interval_secs`.
///
/// Returns a JoinHandle so the caller can abort the task during shutdown.
/// Sweep failures are logged and the loop keeps going.
///
/// # Example
/// ```ignore
/// let sweep_handle = spawn_sweep_task(cache.clone(), 60);
/// // Later, during shutdown:
/// sweep_handle.abort();
/// ```
pub fn spawn_sweep_task(cache: Arc<Cache>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting expired-record sweep with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match cache.purge_expired().await {
                Ok(0) => debug!("Sweep: no expired entries found"),
                Ok(removed) => info!("Sweep: removed {} expired entries", removed),
                Err(e) => warn!(error = %e, "Sweep failed"),
            }
        }
    })
}
