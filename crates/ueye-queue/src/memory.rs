//! In-process [`TaskQueue`] that records what was enqueued.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::error::{QueueError, QueueResult};
use crate::job::ProcessVideoJob;
use crate::queue::TaskQueue;
use ueye_models::VideoId;

/// Keeps enqueued jobs in memory with the same dedup rule as the Redis queue.
#[derive(Debug, Default)]
pub struct MemoryTaskQueue {
    jobs: Mutex<Vec<ProcessVideoJob>>,
    live_keys: Mutex<HashSet<String>>,
    next_id: AtomicU64,
    unavailable: AtomicBool,
}

impl MemoryTaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent enqueue fail as if the broker were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn jobs(&self) -> Vec<ProcessVideoJob> {
        self.jobs.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.jobs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.lock().await.is_empty()
    }

    async fn push(&self, job: ProcessVideoJob) -> QueueResult<String> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::connection_failed("queue unavailable"));
        }
        let key = job.idempotency_key();
        if !self.live_keys.lock().await.insert(key.clone()) {
            return Err(QueueError::Duplicate(key));
        }
        self.jobs.lock().await.push(job);
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{}-0", seq))
    }
}

#[async_trait]
impl TaskQueue for MemoryTaskQueue {
    async fn enqueue_process(&self, job: ProcessVideoJob) -> QueueResult<String> {
        self.push(job).await
    }

    async fn requeue_process(&self, job: ProcessVideoJob) -> QueueResult<String> {
        self.live_keys.lock().await.remove(&job.idempotency_key());
        self.push(job).await
    }

    async fn queued_videos(&self) -> QueueResult<HashSet<VideoId>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(QueueError::connection_failed("queue unavailable"));
        }
        Ok(self.jobs.lock().await.iter().map(|j| j.video_id).collect())
    }
}
