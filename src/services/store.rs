use std::collections::HashMap;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::models::job::PackageJob;

/// Default lifetime of a job record in Redis: 90 days.
pub const DEFAULT_JOB_TTL_SECS: u64 = 90 * 24 * 60 * 60;

/// Durable key/value persistence of job snapshots, keyed by job id.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Resolves once the store can accept commands.
    async fn ready(&self) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<PackageJob>, StoreError>;

    /// Save the full snapshot of `job` under its id, replacing any previous one.
    async fn save(&self, job: &PackageJob) -> Result<(), StoreError>;
}

/// Redis-backed job store. Each job is a JSON string under its own key.
pub struct RedisJobStore {
    client: redis::Client,
    ttl_secs: u64,
}

impl RedisJobStore {
    pub fn new(redis_url: &str, ttl_secs: u64) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url).map_err(StoreError::Redis)?;
        Ok(Self { client, ttl_secs })
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn ready(&self) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PackageJob>, StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let json: Option<String> = conn.get(id).await?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, job: &PackageJob) -> Result<(), StoreError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        conn.set_ex::<_, _, ()>(&job.id, payload, self.ttl_secs).await?;
        tracing::debug!(job_id = %job.id, status = %job.status, "Saved job to Redis");
        Ok(())
    }
}

/// In-process job store for local development and tests.
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<HashMap<String, String>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PackageJob>, StoreError> {
        let jobs = self.jobs.lock().await;
        match jobs.get(id) {
            Some(json) => Ok(Some(serde_json::from_str(json)?)),
            None => Ok(None),
        }
    }

    async fn save(&self, job: &PackageJob) -> Result<(), StoreError> {
        let payload = serde_json::to_string(job)?;
        self.jobs.lock().await.insert(job.id.clone(), payload);
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}
