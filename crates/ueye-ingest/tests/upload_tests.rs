//! Upload orchestrator against in-memory backends and failing fakes.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ueye_db::{DbError, DbResult, MemoryVideoStore, VideoStore};
use ueye_ingest::{IngestConfig, UploadError, UploadOrchestrator, UploadRequest};
use ueye_models::{
    CameraId, KeyPurpose, NewVideo, ObjectKey, TimeOfDay, UserId, ValidationError, VideoId,
    VideoPatch, VideoRecord, VideoStatus,
};
use ueye_queue::{MemoryTaskQueue, QueueJob};
use ueye_storage::{
    MediaBucket, MemoryObjectStore, ObjectInfo, ObjectStore, StorageError, StorageResult,
};
use uuid::Uuid;

const BUCKET: &str = "urban-eye";

struct Harness {
    objects: Arc<MemoryObjectStore>,
    records: Arc<MemoryVideoStore>,
    queue: Arc<MemoryTaskQueue>,
    orchestrator: UploadOrchestrator,
}

fn harness() -> Harness {
    let objects = Arc::new(MemoryObjectStore::new());
    let records = Arc::new(MemoryVideoStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());
    let orchestrator = UploadOrchestrator::new(
        records.clone(),
        MediaBucket::new(objects.clone(), BUCKET),
        queue.clone(),
        IngestConfig::default(),
    );
    Harness {
        objects,
        records,
        queue,
        orchestrator,
    }
}

fn request(filename: &str) -> UploadRequest {
    UploadRequest {
        filename: filename.to_string(),
        title: "Main street, northbound".to_string(),
        time_of_day: "вечер".parse().unwrap(),
        camera_id: CameraId(Uuid::new_v4()),
        uploader_id: UserId(12),
    }
}

/// Object store whose writes always fail.
struct BrokenObjectStore;

#[async_trait]
impl ObjectStore for BrokenObjectStore {
    async fn put(&self, _: &str, key: &str, _: Vec<u8>, _: &str) -> StorageResult<()> {
        Err(StorageError::upload_failed(format!("{}: connection refused", key)))
    }
    async fn get(&self, _: &str, key: &str) -> StorageResult<Vec<u8>> {
        Err(StorageError::not_found(key))
    }
    async fn delete(&self, _: &str, _: &str) -> StorageResult<bool> {
        Ok(false)
    }
    async fn list(&self, _: &str, _: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(Vec::new())
    }
}

/// Record store whose inserts always fail.
struct BrokenVideoStore;

#[async_trait]
impl VideoStore for BrokenVideoStore {
    async fn create(&self, _: NewVideo) -> DbResult<VideoRecord> {
        Err(DbError::config_error("database unavailable"))
    }
    async fn get(&self, _: VideoId) -> DbResult<Option<VideoRecord>> {
        Ok(None)
    }
    async fn update(&self, _: VideoId, _: VideoPatch) -> DbResult<Option<VideoRecord>> {
        Ok(None)
    }
    async fn exists_with_video_key(&self, _: &ObjectKey) -> DbResult<bool> {
        Ok(false)
    }
    async fn exists_with_preview_key(&self, _: &ObjectKey) -> DbResult<bool> {
        Ok(false)
    }
    async fn list_by_status(
        &self,
        _: VideoStatus,
        _: DateTime<Utc>,
        _: u32,
    ) -> DbResult<Vec<VideoRecord>> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_upload_returns_processing_placeholder() {
    let h = harness();

    let record = h
        .orchestrator
        .upload_bytes(request("clip.mp4"), b"not really a video".to_vec())
        .await
        .unwrap();

    assert_eq!(record.status, VideoStatus::Processing);
    assert_eq!(record.time_of_day, TimeOfDay::Evening);
    assert_eq!(record.video_key.purpose(), KeyPurpose::Video);
    assert!(record.preview_key.is_none());
    assert_eq!(record.fps, 0.0);
    assert_eq!(record.duration, 0);
    assert_eq!(record.video_resolution, "0x0");

    // Blob stored before the record, under the record's key
    let stored = h
        .objects
        .get(BUCKET, record.video_key.as_str())
        .await
        .unwrap();
    assert_eq!(stored, b"not really a video");
    assert_eq!(h.records.get(record.id).await.unwrap(), Some(record.clone()));

    let jobs = h.queue.jobs().await;
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].video_id, record.id);
    assert!(!jobs[0].force);
    let wire = serde_json::to_value(QueueJob::from(jobs[0].clone())).unwrap();
    assert_eq!(wire["task"], "process_video");
}

#[tokio::test]
async fn test_validation_failure_touches_nothing() {
    let h = harness();

    let err = h
        .orchestrator
        .upload_bytes(request("clip.mov"), b"bytes".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        UploadError::Validation(ValidationError::UnsupportedFormat(_))
    ));
    assert!(h.objects.is_empty().await);
    assert!(h.records.is_empty().await);
    assert!(h.queue.is_empty().await);
}

#[tokio::test]
async fn test_empty_body_is_rejected_before_storage() {
    let h = harness();

    let err = h
        .orchestrator
        .upload_bytes(request("clip.mp4"), Vec::new())
        .await
        .unwrap_err();

    assert!(err.is_client_error());
    assert!(h.objects.is_empty().await);
}

#[tokio::test]
async fn test_storage_failure_aborts_before_record() {
    let records = Arc::new(MemoryVideoStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());
    let orchestrator = UploadOrchestrator::new(
        records.clone(),
        MediaBucket::new(Arc::new(BrokenObjectStore), BUCKET),
        queue.clone(),
        IngestConfig::default(),
    );

    let err = orchestrator
        .upload_bytes(request("clip.mp4"), b"bytes".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Storage(_)));
    assert!(records.is_empty().await);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_record_failure_leaves_orphan_and_skips_enqueue() {
    let objects = Arc::new(MemoryObjectStore::new());
    let queue = Arc::new(MemoryTaskQueue::new());
    let orchestrator = UploadOrchestrator::new(
        Arc::new(BrokenVideoStore),
        MediaBucket::new(objects.clone(), BUCKET),
        queue.clone(),
        IngestConfig::default(),
    );

    let err = orchestrator
        .upload_bytes(request("clip.mp4"), b"bytes".to_vec())
        .await
        .unwrap_err();

    assert!(matches!(err, UploadError::Record(_)));
    assert_eq!(objects.len().await, 1);
    assert!(queue.is_empty().await);
}

#[tokio::test]
async fn test_enqueue_failure_keeps_processing_record() {
    let h = harness();
    h.queue.set_unavailable(true);

    let err = h
        .orchestrator
        .upload_bytes(request("clip.mp4"), b"bytes".to_vec())
        .await
        .unwrap_err();

    let video_id = match err {
        UploadError::Enqueue { video_id, .. } => video_id,
        other => panic!("unexpected error: {other}"),
    };
    let record = h.records.get(video_id).await.unwrap().unwrap();
    assert_eq!(record.status, VideoStatus::Processing);
}
