use std::collections::VecDeque;

use async_trait::async_trait;
use redis::AsyncCommands;
use tokio::sync::Mutex;

use crate::models::job::PackageJob;

const PRODUCTION_QUEUE_KEY: &str = "googleplaypackagejobs-prod";
const NON_PRODUCTION_QUEUE_KEY: &str = "googleplaypackagejobs-nonprod";

/// Queue key for the given environment. Production and non-production use
/// different lists so staging never picks up production jobs.
pub fn queue_key(app_env: &str) -> &'static str {
    if app_env.eq_ignore_ascii_case("production") {
        PRODUCTION_QUEUE_KEY
    } else {
        NON_PRODUCTION_QUEUE_KEY
    }
}

/// Durable FIFO queue of pending packaging jobs.
///
/// A dequeued job is owned by the caller: the queue must never hand the same
/// entry to two callers.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Add a new job. Returns the queue length after the push.
    async fn enqueue(&self, job: &PackageJob) -> Result<usize, QueueError>;

    /// Remove and return the next pending job, if any.
    async fn dequeue(&self) -> Result<Option<PackageJob>, QueueError>;

    /// Put a job back for a later attempt.
    async fn requeue(&self, job: &PackageJob) -> Result<(), QueueError>;

    async fn len(&self) -> Result<usize, QueueError>;
}

/// Redis list-backed job queue (`RPUSH` to enqueue, `LPOP` to dequeue).
pub struct RedisJobQueue {
    client: redis::Client,
    key: &'static str,
}

impl RedisJobQueue {
    pub fn new(redis_url: &str, app_env: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(redis_url).map_err(QueueError::Redis)?;
        Ok(Self {
            client,
            key: queue_key(app_env),
        })
    }

    async fn push(&self, job: &PackageJob) -> Result<usize, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(job)?;
        let length: usize = conn.rpush(self.key, &payload).await?;
        Ok(length)
    }
}

#[async_trait]
impl JobQueue for RedisJobQueue {
    async fn enqueue(&self, job: &PackageJob) -> Result<usize, QueueError> {
        let length = self.push(job).await?;
        tracing::info!(
            job_id = %job.id,
            queue = self.key,
            queue_length = length,
            "Enqueued packaging job"
        );
        Ok(length)
    }

    async fn dequeue(&self) -> Result<Option<PackageJob>, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload: Option<String> = conn.lpop(self.key, None).await?;
        let Some(payload) = payload else {
            return Ok(None);
        };

        let job: PackageJob = parse_payload(payload)?;
        let remaining: usize = conn.llen(self.key).await.unwrap_or_default();
        tracing::info!(
            job_id = %job.id,
            queue = self.key,
            remaining,
            "Dequeued packaging job"
        );
        Ok(Some(job))
    }

    async fn requeue(&self, job: &PackageJob) -> Result<(), QueueError> {
        self.push(job).await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let length: usize = conn.llen(self.key).await?;
        Ok(length)
    }
}

/// In-process queue for local development and tests. Entries are stored as
/// JSON so a dequeued job is a copy, like with Redis.
#[derive(Default)]
pub struct InMemoryJobQueue {
    entries: Mutex<VecDeque<String>>,
}

impl InMemoryJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a raw payload, bypassing serialization.
    pub async fn push_raw(&self, payload: impl Into<String>) {
        self.entries.lock().await.push_back(payload.into());
    }
}

#[async_trait]
impl JobQueue for InMemoryJobQueue {
    async fn enqueue(&self, job: &PackageJob) -> Result<usize, QueueError> {
        let payload = serde_json::to_string(job)?;
        let mut entries = self.entries.lock().await;
        entries.push_back(payload);
        Ok(entries.len())
    }

    async fn dequeue(&self) -> Result<Option<PackageJob>, QueueError> {
        let payload = self.entries.lock().await.pop_front();
        match payload {
            Some(payload) => Ok(Some(parse_payload(payload)?)),
            None => Ok(None),
        }
    }

    async fn requeue(&self, job: &PackageJob) -> Result<(), QueueError> {
        self.enqueue(job).await?;
        Ok(())
    }

    async fn len(&self) -> Result<usize, QueueError> {
        Ok(self.entries.lock().await.len())
    }
}

fn parse_payload(payload: String) -> Result<PackageJob, QueueError> {
    serde_json::from_str(&payload).map_err(|source| QueueError::Malformed {
        raw: payload,
        source,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The entry was removed from the queue but could not be parsed as a job.
    #[error("Malformed queue entry: {source}")]
    Malformed {
        raw: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::package::PackageOptions;

    #[test]
    fn test_queue_key_per_environment() {
        assert_eq!(queue_key("production"), "googleplaypackagejobs-prod");
        assert_eq!(queue_key("Production"), "googleplaypackagejobs-prod");
        assert_eq!(queue_key("staging"), "googleplaypackagejobs-nonprod");
        assert_eq!(queue_key(""), "googleplaypackagejobs-nonprod");
    }

    #[tokio::test]
    async fn test_in_memory_fifo_order() {
        let queue = InMemoryJobQueue::new();
        let first = PackageJob::new(PackageOptions::for_url("https://one.example"));
        let second = PackageJob::new(PackageOptions::for_url("https://two.example"));

        assert_eq!(queue.enqueue(&first).await.unwrap(), 1);
        assert_eq!(queue.enqueue(&second).await.unwrap(), 2);

        assert_eq!(queue.dequeue().await.unwrap().unwrap().id, first.id);
        assert_eq!(queue.dequeue().await.unwrap().unwrap().id, second.id);
        assert!(queue.dequeue().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_malformed_entry_is_removed_and_reported() {
        let queue = InMemoryJobQueue::new();
        queue.push_raw(r#"{"id":"googleplaypackagejob:x:123456"}"#).await;

        match queue.dequeue().await {
            Err(QueueError::Malformed { raw, .. }) => assert!(raw.contains("123456")),
            other => panic!("expected malformed entry, got {:?}", other),
        }
        assert_eq!(queue.len().await.unwrap(), 0);
    }
}
