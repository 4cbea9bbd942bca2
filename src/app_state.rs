use std::sync::Arc;

use crate::config::AppConfig;
use crate::services::{
    builder::{BuildError, CommandPackageBuilder, PackageBuilder},
    queue::{InMemoryJobQueue, JobQueue, QueueError, RedisJobQueue},
    storage::{ArtifactStore, LocalArtifactStore, R2ArtifactStore, StorageError},
    store::{InMemoryJobStore, JobStore, RedisJobStore, StoreError},
};
use crate::worker::JobProcessor;

/// Shared application state passed to all route handlers and the processor.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub queue: Arc<dyn JobQueue>,
    pub artifacts: Arc<dyn ArtifactStore>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        artifacts: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            store,
            queue,
            artifacts,
        }
    }

    /// Connect the store, queue and artifact store described by `config`,
    /// falling back to local implementations for whatever is not configured.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let (store, queue): (Arc<dyn JobStore>, Arc<dyn JobQueue>) = match &config.redis_url {
            Some(redis_url) => {
                tracing::info!(app_env = %config.app_env, "Using Redis job store and queue");
                (
                    Arc::new(RedisJobStore::new(redis_url, config.job_ttl_secs)?),
                    Arc::new(RedisJobQueue::new(redis_url, &config.app_env)?),
                )
            }
            None => {
                tracing::warn!("REDIS_URL not set, using in-memory job store and queue");
                (
                    Arc::new(InMemoryJobStore::new()),
                    Arc::new(InMemoryJobQueue::new()),
                )
            }
        };

        let artifacts: Arc<dyn ArtifactStore> = match config.r2() {
            Some(r2) => {
                tracing::info!(bucket = %r2.bucket, "Using R2 artifact store");
                Arc::new(R2ArtifactStore::new(
                    r2.bucket,
                    r2.endpoint,
                    r2.access_key,
                    r2.secret_key,
                )?)
            }
            None => {
                tracing::warn!(
                    dir = %config.local_artifact_dir,
                    "R2 not configured, storing artifacts locally"
                );
                Arc::new(LocalArtifactStore::new(&config.local_artifact_dir))
            }
        };

        Ok(Self::new(store, queue, artifacts))
    }

    /// Build the packaging job processor on top of this state.
    pub fn processor(&self, config: &AppConfig) -> Result<JobProcessor, StartupError> {
        let builder: Arc<dyn PackageBuilder> =
            Arc::new(CommandPackageBuilder::from_command_line(&config.builder_command)?);
        Ok(JobProcessor::new(
            self.store.clone(),
            self.queue.clone(),
            builder,
            self.artifacts.clone(),
            config.processor_config(),
        ))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Job store: {0}")]
    Store(#[from] StoreError),

    #[error("Job queue: {0}")]
    Queue(#[from] QueueError),

    #[error("Artifact store: {0}")]
    Storage(#[from] StorageError),

    #[error("Package builder: {0}")]
    Builder(#[from] BuildError),
}
