use serde::Serialize;

use crate::models::job::PackageJob;

/// Response after enqueueing a packaging job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponse {
    pub job_id: String,
    pub status: String,
    pub queue_length: usize,
}

/// Response for querying job status.
pub type JobStatusResponse = PackageJob;
