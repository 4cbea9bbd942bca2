//! In-process fakes for driving the job processor in tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pwa_packager::models::job::{JobStatus, PackageJob};
use pwa_packager::models::package::PackageOptions;
use pwa_packager::models::progress::ProgressEvent;
use pwa_packager::services::builder::{BuildError, BuiltPackage, PackageBuilder, ProgressFn};
use pwa_packager::services::queue::{InMemoryJobQueue, JobQueue, QueueError};
use pwa_packager::services::storage::{ArtifactStore, StorageError};
use pwa_packager::services::store::{InMemoryJobStore, JobStore, StoreError};
use pwa_packager::worker::{JobProcessor, ProcessorConfig, RetryPolicy};

/// Ordered record of what the fakes saw, e.g. `save:InProgress`, `build`, `upload`.
pub type Timeline = Arc<Mutex<Vec<String>>>;

pub fn timeline() -> Timeline {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn new_job(retry_count: u32) -> PackageJob {
    let mut job = PackageJob::new(PackageOptions::for_url("https://example.com/"));
    job.retry_count = retry_count;
    job
}

fn store_error() -> StoreError {
    StoreError::Serialize(serde_json::from_str::<serde_json::Value>("{").unwrap_err())
}

type SavePredicate = Box<dyn Fn(&PackageJob) -> bool + Send + Sync>;

/// Job store that records every save and can be told to reject some.
pub struct RecordingStore {
    inner: InMemoryJobStore,
    timeline: Timeline,
    saves: Mutex<Vec<PackageJob>>,
    fail_when: Mutex<Option<SavePredicate>>,
}

impl RecordingStore {
    pub fn new(timeline: Timeline) -> Self {
        Self {
            inner: InMemoryJobStore::new(),
            timeline,
            saves: Mutex::new(Vec::new()),
            fail_when: Mutex::new(None),
        }
    }

    pub fn fail_when(&self, predicate: impl Fn(&PackageJob) -> bool + Send + Sync + 'static) {
        *self.fail_when.lock().unwrap() = Some(Box::new(predicate));
    }

    /// Every snapshot passed to `save`, including rejected ones.
    pub fn saves(&self) -> Vec<PackageJob> {
        self.saves.lock().unwrap().clone()
    }

    /// Store a record without recording it as a processor save.
    pub async fn insert(&self, job: &PackageJob) {
        self.inner.save(job).await.unwrap();
    }

    pub async fn stored(&self, id: &str) -> PackageJob {
        self.inner.get(id).await.unwrap().expect("job should be stored")
    }
}

#[async_trait]
impl JobStore for RecordingStore {
    async fn ready(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<PackageJob>, StoreError> {
        self.inner.get(id).await
    }

    async fn save(&self, job: &PackageJob) -> Result<(), StoreError> {
        self.saves.lock().unwrap().push(job.clone());
        self.timeline
            .lock()
            .unwrap()
            .push(format!("save:{:?}", job.status));
        let reject = self
            .fail_when
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|predicate| predicate(job));
        if reject {
            return Err(store_error());
        }
        self.inner.save(job).await
    }
}

/// Job queue that counts dequeues, records requeues, and can fail dequeues
/// or requeues.
pub struct RecordingQueue {
    inner: InMemoryJobQueue,
    dequeues: AtomicUsize,
    requeued: Mutex<Vec<PackageJob>>,
    failing_dequeues: Mutex<Vec<usize>>,
    panicking_dequeues: Mutex<Vec<usize>>,
    fail_requeues: AtomicBool,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self {
            inner: InMemoryJobQueue::new(),
            dequeues: AtomicUsize::new(0),
            requeued: Mutex::new(Vec::new()),
            failing_dequeues: Mutex::new(Vec::new()),
            panicking_dequeues: Mutex::new(Vec::new()),
            fail_requeues: AtomicBool::new(false),
        }
    }

    /// Make the n-th dequeue call (1-based) fail.
    pub fn fail_dequeue(&self, call: usize) {
        self.failing_dequeues.lock().unwrap().push(call);
    }

    /// Make the n-th dequeue call (1-based) panic.
    pub fn panic_on_dequeue(&self, call: usize) {
        self.panicking_dequeues.lock().unwrap().push(call);
    }

    /// Make every requeue fail. Attempts are still recorded.
    pub fn fail_requeues(&self) {
        self.fail_requeues.store(true, Ordering::SeqCst);
    }

    pub async fn push_raw(&self, payload: &str) {
        self.inner.push_raw(payload).await;
    }

    pub fn dequeue_count(&self) -> usize {
        self.dequeues.load(Ordering::SeqCst)
    }

    pub fn requeued(&self) -> Vec<PackageJob> {
        self.requeued.lock().unwrap().clone()
    }
}

#[async_trait]
impl JobQueue for RecordingQueue {
    async fn enqueue(&self, job: &PackageJob) -> Result<usize, QueueError> {
        self.inner.enqueue(job).await
    }

    async fn dequeue(&self) -> Result<Option<PackageJob>, QueueError> {
        let call = self.dequeues.fetch_add(1, Ordering::SeqCst) + 1;
        let panics = self.panicking_dequeues.lock().unwrap().contains(&call);
        if panics {
            panic!("queue client blew up");
        }
        if self.failing_dequeues.lock().unwrap().contains(&call) {
            return Err(QueueError::Serialize(
                serde_json::from_str::<serde_json::Value>("[").unwrap_err(),
            ));
        }
        self.inner.dequeue().await
    }

    async fn requeue(&self, job: &PackageJob) -> Result<(), QueueError> {
        self.requeued.lock().unwrap().push(job.clone());
        if self.fail_requeues.load(Ordering::SeqCst) {
            return Err(QueueError::Serialize(
                serde_json::from_str::<serde_json::Value>("]").unwrap_err(),
            ));
        }
        self.inner.requeue(job).await
    }

    async fn len(&self) -> Result<usize, QueueError> {
        self.inner.len().await
    }
}

/// What the fake builder does on each call. The last behavior repeats.
#[derive(Clone)]
pub enum BuildBehavior {
    Succeed(Vec<ProgressEvent>),
    Fail(&'static str),
    Panic,
}

pub struct FakeBuilder {
    behaviors: Mutex<VecDeque<BuildBehavior>>,
    timeline: Timeline,
    output_dir: tempfile::TempDir,
    calls: AtomicUsize,
}

impl FakeBuilder {
    pub fn new(timeline: Timeline, behaviors: Vec<BuildBehavior>) -> Self {
        Self {
            behaviors: Mutex::new(behaviors.into()),
            timeline,
            output_dir: tempfile::tempdir().unwrap(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn succeeding(timeline: Timeline) -> Self {
        Self::new(timeline, vec![BuildBehavior::Succeed(Vec::new())])
    }

    pub fn failing(timeline: Timeline) -> Self {
        Self::new(timeline, vec![BuildBehavior::Fail("gradle exited with code 1")])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn next_behavior(&self) -> BuildBehavior {
        let mut behaviors = self.behaviors.lock().unwrap();
        if behaviors.len() > 1 {
            behaviors.pop_front().unwrap()
        } else {
            behaviors.front().cloned().unwrap()
        }
    }
}

#[async_trait]
impl PackageBuilder for FakeBuilder {
    async fn build(
        &self,
        _options: &PackageOptions,
        progress: &ProgressFn<'_>,
    ) -> Result<BuiltPackage, BuildError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.timeline.lock().unwrap().push("build".to_string());
        match self.next_behavior() {
            BuildBehavior::Succeed(events) => {
                for event in events {
                    progress(event);
                    tokio::task::yield_now().await;
                }
                let path = self.output_dir.path().join(format!("package-{}.zip", call));
                std::fs::write(&path, b"zip").unwrap();
                Ok(BuiltPackage::new(path))
            }
            BuildBehavior::Fail(message) => {
                progress(ProgressEvent::error(message));
                Err(BuildError::Other(message.to_string()))
            }
            BuildBehavior::Panic => panic!("builder blew up"),
        }
    }
}

/// Artifact store returning a fixed reference, or failing.
pub struct FakeArtifacts {
    timeline: Timeline,
    reference: Option<String>,
    uploads: Mutex<Vec<(PathBuf, String)>>,
}

impl FakeArtifacts {
    pub fn returning(timeline: Timeline, reference: &str) -> Self {
        Self {
            timeline,
            reference: Some(reference.to_string()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(timeline: Timeline) -> Self {
        Self {
            timeline,
            reference: None,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn uploads(&self) -> Vec<(PathBuf, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl ArtifactStore for FakeArtifacts {
    async fn upload(&self, local_path: &Path, name: &str) -> Result<String, StorageError> {
        self.timeline.lock().unwrap().push("upload".to_string());
        self.uploads
            .lock()
            .unwrap()
            .push((local_path.to_path_buf(), name.to_string()));
        self.reference.clone().ok_or_else(|| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "blob storage unavailable",
            ))
        })
    }

    async fn download(&self, reference: &str) -> Result<Vec<u8>, StorageError> {
        Err(StorageError::NotFound(reference.to_string()))
    }
}

pub fn config(max_retries: u32) -> ProcessorConfig {
    ProcessorConfig {
        poll_interval: Duration::from_secs(3),
        initial_delay: Duration::from_secs(1),
        retry: RetryPolicy::new(max_retries),
    }
}

pub fn processor(
    store: &Arc<RecordingStore>,
    queue: &Arc<RecordingQueue>,
    builder: &Arc<FakeBuilder>,
    artifacts: &Arc<FakeArtifacts>,
    max_retries: u32,
) -> JobProcessor {
    JobProcessor::new(
        store.clone(),
        queue.clone(),
        builder.clone(),
        artifacts.clone(),
        config(max_retries),
    )
}

/// Save `job` and put it on the queue, as the enqueue endpoint does.
pub async fn seed(store: &RecordingStore, queue: &RecordingQueue, job: &PackageJob) {
    store.insert(job).await;
    queue.enqueue(job).await.unwrap();
}

pub fn assert_never_completed(saves: &[PackageJob]) {
    assert!(
        saves.iter().all(|job| job.status != JobStatus::Completed),
        "job was saved as Completed: {:?}",
        saves.iter().map(|j| j.status).collect::<Vec<_>>()
    );
}
