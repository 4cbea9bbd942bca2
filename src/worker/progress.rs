use std::sync::Arc;

use tokio::sync::mpsc;

use crate::models::job::PackageJob;
use crate::models::progress::ProgressEvent;
use crate::services::job_logger::JobLogger;
use crate::services::store::JobStore;

/// Relays builder progress into the job logger and checkpoints job snapshots.
///
/// The logger is written synchronously from the callback; snapshots go over a
/// channel and are saved by [`ProgressRelay::run`]. Save failures are logged
/// and dropped: checkpoints never affect the outcome of a build.
pub struct ProgressRelay {
    store: Arc<dyn JobStore>,
    rx: mpsc::UnboundedReceiver<PackageJob>,
}

/// Sending half of a [`ProgressRelay`], owned by the progress callback.
#[derive(Clone)]
pub struct ProgressSender {
    tx: mpsc::UnboundedSender<PackageJob>,
}

impl ProgressRelay {
    pub fn new(store: Arc<dyn JobStore>) -> (ProgressSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ProgressSender { tx }, Self { store, rx })
    }

    /// Save snapshots until every sender is dropped.
    pub async fn run(mut self) {
        while let Some(snapshot) = self.rx.recv().await {
            if let Err(e) = self.store.save(&snapshot).await {
                tracing::warn!(
                    job_id = %snapshot.id,
                    error = %e,
                    "Failed to checkpoint job progress"
                );
            }
        }
    }
}

impl ProgressSender {
    /// Record `event` for `job` and queue a snapshot of it for saving.
    pub fn relay(&self, job: &PackageJob, logger: &dyn JobLogger, event: ProgressEvent) {
        logger.log_progress(&event);
        let mut snapshot = job.clone();
        snapshot.apply_trail(logger);
        if self.tx.send(snapshot).is_err() {
            tracing::debug!(job_id = %job.id, "Progress relay closed, dropping checkpoint");
        }
    }
}

/// Record a single event outside of a build and checkpoint the job right away.
pub async fn relay_now(
    store: &dyn JobStore,
    job: &PackageJob,
    logger: &dyn JobLogger,
    event: ProgressEvent,
) {
    logger.log_progress(&event);
    let mut snapshot = job.clone();
    snapshot.apply_trail(logger);
    if let Err(e) = store.save(&snapshot).await {
        tracing::warn!(job_id = %job.id, error = %e, "Failed to checkpoint job progress");
    }
}
