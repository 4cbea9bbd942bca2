//! Background processor for Google Play packaging jobs.
//!
//! The processor polls the job queue on a fixed delay, runs one job at a time
//! through build and upload, and applies the retry policy to anything that
//! fails. A failing job never stops the loop.

pub mod error;
pub mod progress;
pub mod retry;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::models::job::{JobStatus, PackageJob};
use crate::models::progress::ProgressEvent;
use crate::services::builder::PackageBuilder;
use crate::services::job_logger::{JobLogger, TracingJobLogger};
use crate::services::queue::{JobQueue, QueueError};
use crate::services::storage::ArtifactStore;
use crate::services::store::JobStore;

pub use error::JobError;
use progress::ProgressRelay;
pub use retry::{RetryDecision, RetryPolicy};

/// Default delay between polls.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default delay before the first poll.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy)]
pub struct ProcessorConfig {
    /// Delay between the end of one tick and the start of the next.
    pub poll_interval: Duration,
    /// Delay between store readiness and the first tick.
    pub initial_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            initial_delay: DEFAULT_INITIAL_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

/// Result of a single tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The queue was empty.
    Idle,
    Completed,
    /// The attempt failed and the job went back on the queue.
    Requeued,
    /// The attempt failed and the job was marked failed.
    Failed,
    /// Something went wrong that could not be attributed to a job.
    Error,
}

/// Polls the job queue and drives each job through build, upload and the
/// retry policy.
pub struct JobProcessor {
    store: Arc<dyn JobStore>,
    queue: Arc<dyn JobQueue>,
    builder: Arc<dyn PackageBuilder>,
    artifacts: Arc<dyn ArtifactStore>,
    config: ProcessorConfig,
}

impl JobProcessor {
    pub fn new(
        store: Arc<dyn JobStore>,
        queue: Arc<dyn JobQueue>,
        builder: Arc<dyn PackageBuilder>,
        artifacts: Arc<dyn ArtifactStore>,
        config: ProcessorConfig,
    ) -> Self {
        Self {
            store,
            queue,
            builder,
            artifacts,
            config,
        }
    }

    /// Spawn the polling loop. Call once per process; the loop runs until the
    /// runtime shuts down.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }

    /// Run the polling loop on the current task. Never returns.
    pub async fn run(&self) {
        self.wait_until_ready().await;
        tracing::info!(
            poll_interval_ms = self.config.poll_interval.as_millis() as u64,
            max_retries = self.config.retry.max_retries,
            "Job store ready, starting packaging job processor"
        );
        sleep(self.config.initial_delay).await;

        loop {
            match AssertUnwindSafe(self.tick()).catch_unwind().await {
                Ok(TickOutcome::Idle) => tracing::trace!("No packaging jobs available"),
                Ok(outcome) => tracing::debug!(?outcome, "Tick finished"),
                Err(panic) => tracing::error!(
                    error = %panic_message(&*panic),
                    "Packaging job processor tick panicked"
                ),
            }
            sleep(self.config.poll_interval).await;
        }
    }

    async fn wait_until_ready(&self) {
        loop {
            match self.store.ready().await {
                Ok(()) => return,
                Err(e) => {
                    tracing::warn!(error = %e, "Job store not ready, waiting");
                    sleep(self.config.poll_interval).await;
                }
            }
        }
    }

    /// Dequeue and process at most one job.
    pub async fn tick(&self) -> TickOutcome {
        let mut job = match self.queue.dequeue().await {
            Ok(Some(job)) => job,
            Ok(None) => return TickOutcome::Idle,
            Err(e @ QueueError::Malformed { .. }) => return self.recover_malformed(e).await,
            Err(e) => {
                tracing::error!(error = %e, "Error dequeuing packaging job");
                return TickOutcome::Error;
            }
        };

        tracing::info!(
            job_id = %job.id,
            retry_count = job.retry_count,
            "Processing packaging job"
        );
        let logger = TracingJobLogger::for_job(&job);

        let result = match AssertUnwindSafe(self.process_job(&mut job, &logger))
            .catch_unwind()
            .await
        {
            Ok(result) => result,
            Err(panic) => Err(JobError::Panicked(panic_message(&*panic))),
        };

        match result {
            Ok(()) => TickOutcome::Completed,
            Err(e) => {
                logger.error("Packaging attempt failed", &e);
                self.retry_or_fail(job, &e, &logger).await
            }
        }
    }

    /// Run one attempt: mark in progress, build, upload, mark completed.
    async fn process_job(
        &self,
        job: &mut PackageJob,
        logger: &dyn JobLogger,
    ) -> Result<(), JobError> {
        job.set_status(JobStatus::InProgress);
        logger.info(&format!(
            "Starting packaging, attempt {} of {}",
            job.retry_count + 1,
            self.config.retry.max_attempts()
        ));
        job.apply_trail(logger);
        self.store.save(job).await?;
        metrics::counter!("package_jobs_started_total").increment(1);

        let (sender, relay) = ProgressRelay::new(self.store.clone());
        let started = Instant::now();
        let snapshot_source: &PackageJob = job;
        let build = async move {
            let progress =
                move |event: ProgressEvent| sender.relay(snapshot_source, logger, event);
            self.builder
                .build(&snapshot_source.package_options, &progress)
                .await
        };
        let (built, ()) = tokio::join!(build, relay.run());
        metrics::histogram!("package_build_seconds").record(started.elapsed().as_secs_f64());
        let built = built?;

        progress::relay_now(
            self.store.as_ref(),
            job,
            logger,
            ProgressEvent::info("Package built successfully"),
        )
        .await;

        let artifact_name = job.artifact_name();
        let reference = match self.artifacts.upload(built.path(), &artifact_name).await {
            Ok(reference) => reference,
            Err(e) => {
                logger.error("Failed to upload package artifact", &e);
                return Err(e.into());
            }
        };

        let mut completed = job.clone();
        completed.uploaded_artifact_name = Some(reference);
        completed.set_status(JobStatus::Completed);
        logger.info("Package uploaded, job completed");
        completed.apply_trail(logger);
        self.store.save(&completed).await?;
        *job = completed;

        metrics::counter!("package_jobs_completed_total").increment(1);
        tracing::info!(
            job_id = %job.id,
            artifact = ?job.uploaded_artifact_name,
            "Packaging job completed"
        );
        Ok(())
    }

    /// Requeue the job if it has retries left, otherwise mark it failed.
    async fn retry_or_fail(
        &self,
        mut job: PackageJob,
        error: &JobError,
        logger: &dyn JobLogger,
    ) -> TickOutcome {
        job.uploaded_artifact_name = None;

        match self.config.retry.decide(job.retry_count) {
            RetryDecision::Retry { retry_count } => {
                job.retry_count = retry_count;
                job.set_status(JobStatus::Pending);
                logger.info(&format!(
                    "Retrying packaging job, retry {} of {}",
                    retry_count, self.config.retry.max_retries
                ));
                job.apply_trail(logger);
                if let Err(e) = self.store.save(&job).await {
                    logger.error("Failed to save job before requeue", &e);
                }
                if let Err(e) = self.queue.requeue(&job).await {
                    // No queue entry exists any more, so a Pending record
                    // would never be picked up again.
                    logger.error("Failed to requeue packaging job, marking it failed", &e);
                    return self.mark_failed(job, logger).await;
                }
                metrics::counter!("package_jobs_retried_total").increment(1);
                TickOutcome::Requeued
            }
            RetryDecision::Fail { attempts } => {
                logger.error(
                    &format!("Packaging job failed after {} attempts", attempts),
                    error,
                );
                self.mark_failed(job, logger).await
            }
        }
    }

    async fn mark_failed(&self, mut job: PackageJob, logger: &dyn JobLogger) -> TickOutcome {
        job.set_status(JobStatus::Failed);
        job.apply_trail(logger);
        if let Err(e) = self.store.save(&job).await {
            logger.error("Failed to save failed job", &e);
        }
        metrics::counter!("package_jobs_failed_total").increment(1);
        TickOutcome::Failed
    }

    /// Handle a queue entry that could not be parsed. The entry is gone from
    /// the queue, so the stored record (if any) is the only job left to retry.
    async fn recover_malformed(&self, error: QueueError) -> TickOutcome {
        let job_id = match &error {
            QueueError::Malformed { raw, .. } => serde_json::from_str::<serde_json::Value>(raw)
                .ok()
                .and_then(|v| v.get("id")?.as_str().map(str::to_string)),
            _ => None,
        };

        let fallback = TracingJobLogger::detached(job_id.as_deref().unwrap_or("unknown"));
        fallback.error("Dequeued a malformed packaging job", &error);

        let Some(job_id) = job_id else {
            return TickOutcome::Error;
        };

        match self.store.get(&job_id).await {
            Ok(Some(job)) if !job.status.is_terminal() => {
                let logger = TracingJobLogger::for_job(&job);
                logger.error("Queue entry for this job was malformed", &error);
                self.retry_or_fail(job, &JobError::Queue(error), &logger).await
            }
            Ok(_) => TickOutcome::Error,
            Err(e) => {
                fallback.error("Failed to load job record for malformed entry", &e);
                TickOutcome::Error
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
