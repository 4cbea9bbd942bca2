use std::sync::{Mutex, PoisonError};

use crate::models::job::PackageJob;
use crate::models::progress::{ProgressEvent, ProgressLevel};

/// Log trail of one job: informational lines and error lines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogTrail {
    pub logs: Vec<String>,
    pub errors: Vec<String>,
}

/// Records progress and errors for a single job.
///
/// Calls are fire-and-forget: a logger never reports its own failures.
pub trait JobLogger: Send + Sync {
    fn info(&self, message: &str);

    fn error(&self, message: &str, error: &dyn std::error::Error);

    fn log_progress(&self, event: &ProgressEvent);

    /// Everything recorded so far, including entries the job carried in.
    fn trail(&self) -> LogTrail;
}

/// Job logger that emits `tracing` events tagged with the job id and keeps
/// the trail so it can be persisted with the job.
pub struct TracingJobLogger {
    job_id: String,
    trail: Mutex<LogTrail>,
}

impl TracingJobLogger {
    /// Logger for a job, seeded with the trail of its earlier attempts.
    pub fn for_job(job: &PackageJob) -> Self {
        Self {
            job_id: job.id.clone(),
            trail: Mutex::new(LogTrail {
                logs: job.logs.clone(),
                errors: job.errors.clone(),
            }),
        }
    }

    /// Logger for a queue entry that could not be turned into a job.
    pub fn detached(raw_reference: &str) -> Self {
        Self {
            job_id: raw_reference.to_string(),
            trail: Mutex::new(LogTrail::default()),
        }
    }

    fn push_log(&self, line: String) {
        self.trail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .logs
            .push(line);
    }

    fn push_error(&self, line: String) {
        self.trail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .errors
            .push(line);
    }
}

impl JobLogger for TracingJobLogger {
    fn info(&self, message: &str) {
        tracing::info!(job_id = %self.job_id, "{}", message);
        self.push_log(message.to_string());
    }

    fn error(&self, message: &str, error: &dyn std::error::Error) {
        tracing::error!(job_id = %self.job_id, error = %error, "{}", message);
        self.push_error(format!("{}: {}", message, error));
    }

    fn log_progress(&self, event: &ProgressEvent) {
        match event.level {
            ProgressLevel::Info => {
                tracing::info!(job_id = %self.job_id, progress = true, "{}", event.message);
                self.push_log(event.message.clone());
            }
            ProgressLevel::Warn => {
                tracing::warn!(job_id = %self.job_id, progress = true, "{}", event.message);
                self.push_log(event.message.clone());
            }
            ProgressLevel::Error => {
                tracing::error!(job_id = %self.job_id, progress = true, "{}", event.message);
                self.push_error(event.message.clone());
            }
        }
    }

    fn trail(&self) -> LogTrail {
        self.trail
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl PackageJob {
    /// Replace the job's log trail with the logger's.
    pub fn apply_trail(&mut self, logger: &dyn JobLogger) {
        let LogTrail { logs, errors } = logger.trail();
        self.logs = logs;
        self.errors = errors;
    }
}
