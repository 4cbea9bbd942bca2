use std::time::Duration;

use serde::Deserialize;

use crate::services::store::DEFAULT_JOB_TTL_SECS;
use crate::worker::{ProcessorConfig, RetryPolicy};

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000"). Ignored by the worker binary.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Deployment environment. "production" selects the production queue.
    #[serde(default = "default_app_env")]
    pub app_env: String,

    /// Redis connection string for the job store and queue. Without it, jobs
    /// are kept in memory (local development only).
    pub redis_url: Option<String>,

    /// R2 bucket name. Without R2 settings, artifacts are written to
    /// `local_artifact_dir`.
    pub r2_bucket: Option<String>,

    /// R2 endpoint URL
    pub r2_endpoint: Option<String>,

    /// R2 access key ID (S3-compatible)
    pub r2_access_key: Option<String>,

    /// R2 secret access key (S3-compatible)
    pub r2_secret_key: Option<String>,

    #[serde(default = "default_local_artifact_dir")]
    pub local_artifact_dir: String,

    /// Command line of the external package build command.
    pub builder_command: String,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Lifetime of job records in Redis.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,

    /// Whether the API server also runs the job processor in-process.
    #[serde(default = "default_run_worker")]
    pub run_worker: bool,
}

/// R2 connection settings, present only when all four are configured.
pub struct R2Settings<'a> {
    pub bucket: &'a str,
    pub endpoint: &'a str,
    pub access_key: &'a str,
    pub secret_key: &'a str,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_local_artifact_dir() -> String {
    std::env::temp_dir()
        .join("pwa-packager-artifacts")
        .to_string_lossy()
        .into_owned()
}

fn default_poll_interval_ms() -> u64 {
    3000
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    crate::worker::retry::DEFAULT_MAX_RETRIES
}

fn default_job_ttl_secs() -> u64 {
    DEFAULT_JOB_TTL_SECS
}

fn default_run_worker() -> bool {
    true
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    pub fn processor_config(&self) -> ProcessorConfig {
        ProcessorConfig {
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            retry: RetryPolicy::new(self.max_retries),
        }
    }

    pub fn r2(&self) -> Option<R2Settings<'_>> {
        Some(R2Settings {
            bucket: self.r2_bucket.as_deref()?,
            endpoint: self.r2_endpoint.as_deref()?,
            access_key: self.r2_access_key.as_deref()?,
            secret_key: self.r2_secret_key.as_deref()?,
        })
    }
}
