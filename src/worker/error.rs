use crate::services::builder::BuildError;
use crate::services::queue::QueueError;
use crate::services::storage::StorageError;
use crate::services::store::StoreError;

/// Reason a packaging attempt failed. Every variant goes through the retry
/// policy.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Build failed: {0}")]
    Build(#[from] BuildError),

    #[error("Upload failed: {0}")]
    Upload(#[from] StorageError),

    #[error("Job store error: {0}")]
    Store(#[from] StoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Job processing panicked: {0}")]
    Panicked(String),
}
