//! Upload error types.

use thiserror::Error;
use ueye_db::DbError;
use ueye_models::{ValidationError, VideoId};
use ueye_queue::QueueError;
use ueye_storage::StorageError;

pub type UploadResult<T> = Result<T, UploadError>;

/// Failures on the synchronous upload path.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Invalid upload: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to read upload body: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to store raw video: {0}")]
    Storage(#[from] StorageError),

    #[error("Failed to create video record: {0}")]
    Record(#[from] DbError),

    /// The placeholder exists and stays `processing`; a requeue sweep picks it up.
    #[error("Video {video_id} stored but processing was not enqueued: {source}")]
    Enqueue {
        video_id: VideoId,
        #[source]
        source: QueueError,
    },
}

impl UploadError {
    /// Whether the caller sent bad input (as opposed to a backend failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, UploadError::Validation(_))
    }

    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            UploadError::Validation(_) => "validation",
            UploadError::Read(_) => "read",
            UploadError::Storage(_) => "storage",
            UploadError::Record(_) => "record",
            UploadError::Enqueue { .. } => "enqueue",
        }
    }
}
