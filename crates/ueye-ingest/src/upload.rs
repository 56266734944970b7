//! Synchronous half of ingestion.

use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{info, instrument, warn};
use ueye_db::VideoStore;
use ueye_models::{
    validate_title, CameraId, NewVideo, TimeOfDay, UserId, ValidationError, ValidationResult,
    VideoRecord,
};
use ueye_queue::{ProcessVideoJob, TaskQueue};
use ueye_storage::MediaBucket;

use crate::config::IngestConfig;
use crate::error::{UploadError, UploadResult};
use crate::metrics;

/// Everything about an upload except the body.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Client-supplied filename, only used to check the extension
    pub filename: String,
    pub title: String,
    pub time_of_day: TimeOfDay,
    pub camera_id: CameraId,
    /// Pre-authenticated uploader
    pub uploader_id: UserId,
}

/// Stores the raw video, creates the placeholder record and hands the id to
/// the worker queue without waiting for processing.
pub struct UploadOrchestrator {
    records: Arc<dyn VideoStore>,
    bucket: MediaBucket,
    queue: Arc<dyn TaskQueue>,
    config: IngestConfig,
}

impl UploadOrchestrator {
    pub fn new(
        records: Arc<dyn VideoStore>,
        bucket: MediaBucket,
        queue: Arc<dyn TaskQueue>,
        config: IngestConfig,
    ) -> Self {
        Self {
            records,
            bucket,
            queue,
            config,
        }
    }

    pub fn config(&self) -> &IngestConfig {
        &self.config
    }

    /// Check the request shape. No I/O.
    pub fn validate(&self, request: &UploadRequest) -> ValidationResult<()> {
        self.validate_filename(&request.filename)?;
        validate_title(&request.title)
    }

    fn validate_filename(&self, filename: &str) -> ValidationResult<()> {
        if filename.trim().is_empty() {
            return Err(ValidationError::MissingFilename);
        }
        let ext = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| ValidationError::unsupported_format(filename))?;
        if !self.config.allows_extension(ext) {
            return Err(ValidationError::unsupported_format(filename));
        }
        Ok(())
    }

    /// Run the whole synchronous path for a streamed body.
    ///
    /// Storage happens before the record insert, so a record never points at
    /// a missing blob. A failed insert leaves the blob for the orphan sweep.
    #[instrument(
        skip(self, request, body),
        fields(filename = %request.filename, camera_id = %request.camera_id)
    )]
    pub async fn upload<R>(&self, request: UploadRequest, body: R) -> UploadResult<VideoRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        let result = self.try_upload(request, body).await;
        match &result {
            Ok(record) => {
                info!(video_id = %record.id, video_key = %record.video_key, "Upload accepted")
            }
            Err(e) if e.is_client_error() => {
                metrics::record_upload_rejected(e.kind());
                info!(error = %e, "Upload rejected");
            }
            Err(e) => {
                metrics::record_upload_rejected(e.kind());
                warn!(error = %e, "Upload failed");
            }
        }
        result
    }

    /// Same as [`upload`](Self::upload) for a body already in memory.
    pub async fn upload_bytes(
        &self,
        request: UploadRequest,
        bytes: Vec<u8>,
    ) -> UploadResult<VideoRecord> {
        self.upload(request, bytes.as_slice()).await
    }

    async fn try_upload<R>(&self, request: UploadRequest, body: R) -> UploadResult<VideoRecord>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.validate(&request)?;

        let bytes = self.read_body(body).await?;
        let size = bytes.len();

        let video_key = self.bucket.store_video(bytes).await?;

        let record = self
            .records
            .create(NewVideo {
                title: request.title,
                time_of_day: request.time_of_day,
                camera_id: request.camera_id,
                uploader_id: request.uploader_id,
                video_key,
            })
            .await?;

        self.queue
            .enqueue_process(ProcessVideoJob::new(record.id))
            .await
            .map_err(|source| UploadError::Enqueue {
                video_id: record.id,
                source,
            })?;

        metrics::record_upload_accepted(size);
        Ok(record)
    }

    async fn read_body<R>(&self, body: R) -> UploadResult<Vec<u8>>
    where
        R: AsyncRead + Unpin + Send,
    {
        let limit = self.config.max_upload_bytes;
        let mut bytes = Vec::new();
        // One byte past the limit tells "exactly at limit" from "too large"
        body.take(limit.saturating_add(1))
            .read_to_end(&mut bytes)
            .await?;

        if bytes.is_empty() {
            return Err(ValidationError::EmptyPayload.into());
        }
        if bytes.len() as u64 > limit {
            return Err(ValidationError::PayloadTooLarge { limit }.into());
        }
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ueye_db::MemoryVideoStore;
    use ueye_queue::MemoryTaskQueue;
    use ueye_storage::MemoryObjectStore;
    use uuid::Uuid;

    fn orchestrator(config: IngestConfig) -> UploadOrchestrator {
        let bucket = MediaBucket::new(Arc::new(MemoryObjectStore::new()), "urban-eye");
        UploadOrchestrator::new(
            Arc::new(MemoryVideoStore::new()),
            bucket,
            Arc::new(MemoryTaskQueue::new()),
            config,
        )
    }

    fn request(filename: &str, title: &str) -> UploadRequest {
        UploadRequest {
            filename: filename.to_string(),
            title: title.to_string(),
            time_of_day: TimeOfDay::Day,
            camera_id: CameraId(Uuid::new_v4()),
            uploader_id: UserId(5),
        }
    }

    #[test]
    fn test_validate_filename() {
        let orch = orchestrator(IngestConfig::default());

        assert!(orch.validate(&request("clip.mp4", "ok")).is_ok());
        assert!(orch.validate(&request("CLIP.MP4", "ok")).is_ok());
        assert_eq!(
            orch.validate(&request("", "ok")),
            Err(ValidationError::MissingFilename)
        );
        assert!(matches!(
            orch.validate(&request("clip.avi", "ok")),
            Err(ValidationError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            orch.validate(&request("mp4", "ok")),
            Err(ValidationError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_validate_title() {
        let orch = orchestrator(IngestConfig::default());
        assert_eq!(
            orch.validate(&request("clip.mp4", "")),
            Err(ValidationError::EmptyTitle)
        );
        let long = "x".repeat(256);
        assert_eq!(
            orch.validate(&request("clip.mp4", &long)),
            Err(ValidationError::TitleTooLong(256))
        );
    }

    #[tokio::test]
    async fn test_body_limits() {
        let orch = orchestrator(IngestConfig {
            max_upload_bytes: 4,
            ..Default::default()
        });

        let err = orch.read_body(&b""[..]).await.unwrap_err();
        assert!(matches!(err, UploadError::Validation(ValidationError::EmptyPayload)));

        let err = orch.read_body(&b"12345"[..]).await.unwrap_err();
        assert!(matches!(
            err,
            UploadError::Validation(ValidationError::PayloadTooLarge { limit: 4 })
        ));

        assert_eq!(orch.read_body(&b"1234"[..]).await.unwrap(), b"1234");
    }
}
