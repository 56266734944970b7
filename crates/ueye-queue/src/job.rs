//! Job types for the queue.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ueye_models::VideoId;
use uuid::Uuid;

/// Unique identifier of one enqueued job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Job to derive metadata and a preview for an uploaded video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessVideoJob {
    /// Unique job ID
    pub job_id: JobId,
    /// Record to process
    pub video_id: VideoId,
    /// Reprocess even if the record already reached a terminal state
    #[serde(default)]
    pub force: bool,
    /// When the job was created
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl ProcessVideoJob {
    pub fn new(video_id: VideoId) -> Self {
        Self {
            job_id: JobId::new(),
            video_id,
            force: false,
            created_at: Utc::now(),
        }
    }

    /// Operator-initiated retry of a record in any state.
    pub fn forced(video_id: VideoId) -> Self {
        Self {
            force: true,
            ..Self::new(video_id)
        }
    }

    /// Generate idempotency key for deduplication.
    pub fn idempotency_key(&self) -> String {
        if self.force {
            format!("process_video:{}:force", self.video_id)
        } else {
            format!("process_video:{}", self.video_id)
        }
    }
}

/// Generic job wrapper for queue storage.
///
/// Serialized as `{"task": "process_video", "video_id": ..}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "task", rename_all = "snake_case")]
pub enum QueueJob {
    ProcessVideo(ProcessVideoJob),
}

impl QueueJob {
    pub fn job_id(&self) -> &JobId {
        match self {
            QueueJob::ProcessVideo(j) => &j.job_id,
        }
    }

    pub fn video_id(&self) -> VideoId {
        match self {
            QueueJob::ProcessVideo(j) => j.video_id,
        }
    }

    pub fn task_name(&self) -> &'static str {
        match self {
            QueueJob::ProcessVideo(_) => "process_video",
        }
    }

    pub fn idempotency_key(&self) -> String {
        match self {
            QueueJob::ProcessVideo(j) => j.idempotency_key(),
        }
    }
}

impl From<ProcessVideoJob> for QueueJob {
    fn from(job: ProcessVideoJob) -> Self {
        QueueJob::ProcessVideo(job)
    }
}
