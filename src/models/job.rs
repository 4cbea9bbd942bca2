use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::models::package::PackageOptions;

/// Prefix embedded in every Google Play packaging job id.
pub const JOB_ID_PREFIX: &str = "googleplaypackagejob:";

/// Extension of the uploaded package artifact.
pub const ARTIFACT_EXTENSION: &str = ".zip";

/// Status of a packaging job.
///
/// A retried job goes back to `Pending`; `retry_count` is the only thing that
/// distinguishes it from a first attempt.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
pub enum JobStatus {
    #[serde(rename = "Queued")]
    #[strum(serialize = "Queued")]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// A Google Play packaging job, as stored in the job store and the queue.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PackageJob {
    pub id: String,
    pub pwa_url: String,
    pub status: JobStatus,
    pub retry_count: u32,
    pub package_options: PackageOptions,
    pub uploaded_artifact_name: Option<String>,
    #[serde(default)]
    pub logs: Vec<String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PackageJob {
    /// Create a new pending job for the given options.
    pub fn new(package_options: PackageOptions) -> Self {
        let now = Utc::now();
        let host = reqwest::Url::parse(&package_options.pwa_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        let suffix = Uuid::new_v4().simple().to_string();
        let id = format!("{}{}:{}", JOB_ID_PREFIX, host, &suffix[suffix.len() - 6..]);

        Self {
            id,
            pwa_url: package_options.pwa_url.clone(),
            status: JobStatus::Pending,
            retry_count: 0,
            package_options,
            uploaded_artifact_name: None,
            logs: Vec::new(),
            errors: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Destination name of this job's artifact in the artifact store.
    pub fn artifact_name(&self) -> String {
        artifact_name_for(&self.id)
    }

    /// Set a new status and bump `updated_at`.
    pub fn set_status(&mut self, status: JobStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }
}

/// Derive the artifact name from a job id: the job-type prefix is stripped and
/// the fixed artifact extension appended.
pub fn artifact_name_for(job_id: &str) -> String {
    let stem = job_id.strip_prefix(JOB_ID_PREFIX).unwrap_or(job_id);
    format!("{}{}", stem, ARTIFACT_EXTENSION)
}
