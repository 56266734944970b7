//! Reconciliation sweeps for the gaps the pipeline accepts.
//!
//! - Orphaned blobs: a raw video stored by an upload whose record insert then
//!   failed, or a preview whose record was reset or never finalized. Nothing
//!   references it, so it is deleted after a grace period.
//! - Stale records: a record left `processing` because its queue message was
//!   lost (enqueue failure, DLQ). The job is enqueued again unless one is
//!   still in the queue.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};
use ueye_db::VideoStore;
use ueye_models::{KeyPurpose, ObjectKey, VideoStatus};
use ueye_queue::{ProcessVideoJob, TaskQueue};
use ueye_storage::MediaBucket;

use crate::error::WorkerResult;
use crate::metrics;

/// Result of an orphaned-blob sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrphanReport {
    /// Video and preview blobs old enough to be considered
    pub scanned: usize,
    /// Keys with no matching record
    pub orphaned: Vec<String>,
    /// Orphans actually removed (zero on a dry run)
    pub deleted: usize,
}

/// Result of a stale-record requeue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequeueReport {
    pub processing: usize,
    pub failed: usize,
    /// Records left alone because a job for them is still queued or running
    pub skipped: usize,
    /// Records whose job could not be enqueued
    pub errors: usize,
}

impl RequeueReport {
    pub fn requeued(&self) -> usize {
        self.processing + self.failed
    }
}

pub struct Reconciler {
    records: Arc<dyn VideoStore>,
    bucket: MediaBucket,
    queue: Arc<dyn TaskQueue>,
}

impl Reconciler {
    pub fn new(
        records: Arc<dyn VideoStore>,
        bucket: MediaBucket,
        queue: Arc<dyn TaskQueue>,
    ) -> Self {
        Self {
            records,
            bucket,
            queue,
        }
    }

    /// Find `videos/` and `previews/` blobs older than `grace` that no record
    /// points at.
    ///
    /// The grace period covers uploads between the blob put and the record
    /// insert, and previews stored ahead of their `ready` update. Blobs without
    /// a modification time are never touched.
    pub async fn sweep_orphans(
        &self,
        grace: Duration,
        dry_run: bool,
    ) -> WorkerResult<OrphanReport> {
        let cutoff = Utc::now() - grace;
        let mut report = OrphanReport::default();

        for purpose in [KeyPurpose::Video, KeyPurpose::Preview] {
            self.sweep_prefix(purpose, cutoff, dry_run, &mut report).await?;
        }

        metrics::record_orphans(report.orphaned.len(), report.deleted);
        info!(
            scanned = report.scanned,
            orphaned = report.orphaned.len(),
            deleted = report.deleted,
            "Orphan sweep finished"
        );
        Ok(report)
    }

    async fn sweep_prefix(
        &self,
        purpose: KeyPurpose,
        cutoff: DateTime<Utc>,
        dry_run: bool,
        report: &mut OrphanReport,
    ) -> WorkerResult<()> {
        for object in self.bucket.list(purpose).await? {
            match object.last_modified {
                Some(modified) if modified <= cutoff => {}
                _ => continue,
            }
            report.scanned += 1;

            let key = match ObjectKey::parse(object.key.as_str()) {
                Ok(key) => key,
                Err(e) => {
                    warn!(key = %object.key, error = %e, "Skipping unrecognized key");
                    continue;
                }
            };

            let referenced = match key.purpose() {
                KeyPurpose::Video => self.records.exists_with_video_key(&key).await?,
                KeyPurpose::Preview => self.records.exists_with_preview_key(&key).await?,
            };
            if referenced {
                continue;
            }

            info!(key = %key, size = object.size, dry_run, "Orphaned blob");
            if !dry_run {
                match self.bucket.delete(&key).await {
                    Ok(_) => report.deleted += 1,
                    Err(e) => warn!(%key, error = %e, "Failed to delete orphaned blob"),
                }
            }
            report.orphaned.push(key.into_string());
        }
        Ok(())
    }

    /// Enqueue again records stuck in `processing` for longer than `older_than`.
    ///
    /// With `include_failed`, `failed` records of the same age get a forced job.
    /// Records with a job still in the stream are skipped, so a slow run is
    /// never joined by a second one. Fails without enqueueing anything when
    /// the queue cannot be read.
    pub async fn requeue_stale(
        &self,
        older_than: Duration,
        include_failed: bool,
        limit: u32,
        dry_run: bool,
    ) -> WorkerResult<RequeueReport> {
        let before = Utc::now() - older_than;
        let mut report = RequeueReport::default();
        let queued = self.queue.queued_videos().await?;

        let mut statuses = vec![VideoStatus::Processing];
        if include_failed {
            statuses.push(VideoStatus::Failed);
        }

        for status in statuses {
            let stale = self.records.list_by_status(status, before, limit).await?;
            let mut count = 0;

            for record in stale {
                if queued.contains(&record.id) {
                    debug!(video_id = %record.id, %status, "Job still queued, skipping");
                    report.skipped += 1;
                    continue;
                }

                let job = match status {
                    VideoStatus::Processing => ProcessVideoJob::new(record.id),
                    _ => ProcessVideoJob::forced(record.id),
                };

                if dry_run {
                    info!(video_id = %record.id, %status, "Would requeue");
                    count += 1;
                    continue;
                }

                match self.queue.requeue_process(job).await {
                    Ok(message_id) => {
                        info!(video_id = %record.id, %status, %message_id, "Requeued");
                        count += 1;
                    }
                    Err(e) => {
                        warn!(video_id = %record.id, error = %e, "Failed to requeue");
                        report.errors += 1;
                    }
                }
            }

            match status {
                VideoStatus::Processing => report.processing = count,
                _ => report.failed = count,
            }
            if !dry_run {
                metrics::record_requeued(status.as_str(), count);
            }
        }

        info!(
            processing = report.processing,
            failed = report.failed,
            skipped = report.skipped,
            errors = report.errors,
            dry_run,
            "Stale record requeue finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ueye_db::MemoryVideoStore;
    use tokio_test::{assert_err, assert_ok};
    use ueye_models::{CameraId, ExtractedMetadata, NewVideo, TimeOfDay, UserId, VideoPatch};
    use ueye_queue::MemoryTaskQueue;
    use ueye_storage::MemoryObjectStore;
    use uuid::Uuid;

    struct Harness {
        objects: Arc<MemoryObjectStore>,
        records: Arc<MemoryVideoStore>,
        queue: Arc<MemoryTaskQueue>,
        bucket: MediaBucket,
        reconciler: Reconciler,
    }

    fn harness() -> Harness {
        let objects = Arc::new(MemoryObjectStore::new());
        let records = Arc::new(MemoryVideoStore::new());
        let queue = Arc::new(MemoryTaskQueue::new());
        let bucket = MediaBucket::new(objects.clone(), "urban-eye");
        let reconciler = Reconciler::new(records.clone(), bucket.clone(), queue.clone());
        Harness {
            objects,
            records,
            queue,
            bucket,
            reconciler,
        }
    }

    fn new_video(key: ObjectKey) -> NewVideo {
        NewVideo {
            title: "Crossing".to_string(),
            time_of_day: TimeOfDay::Night,
            camera_id: CameraId(Uuid::new_v4()),
            uploader_id: UserId(1),
            video_key: key,
        }
    }

    async fn age(h: &Harness, key: &ObjectKey, hours: i64) {
        let at = Utc::now() - Duration::hours(hours);
        assert!(h.objects.set_last_modified("urban-eye", key.as_str(), at).await);
    }

    #[tokio::test]
    async fn test_sweep_deletes_only_old_unreferenced_blobs() {
        let h = harness();

        let referenced = h.bucket.store_video(b"a".to_vec()).await.unwrap();
        h.records.create(new_video(referenced.clone())).await.unwrap();
        age(&h, &referenced, 48).await;

        let orphan = h.bucket.store_video(b"b".to_vec()).await.unwrap();
        age(&h, &orphan, 48).await;

        let recent = h.bucket.store_video(b"c".to_vec()).await.unwrap();

        let report = h
            .reconciler
            .sweep_orphans(Duration::hours(24), false)
            .await
            .unwrap();

        assert_eq!(report.scanned, 2);
        assert_eq!(report.orphaned, vec![orphan.as_str().to_string()]);
        assert_eq!(report.deleted, 1);
        assert!(h.bucket.fetch(&orphan).await.is_err());
        assert_ok!(h.bucket.fetch(&referenced).await);
        assert_ok!(h.bucket.fetch(&recent).await);
    }

    #[tokio::test]
    async fn test_sweep_deletes_unreferenced_previews() {
        let h = harness();
        let video = h.bucket.store_video(b"a".to_vec()).await.unwrap();
        let record = h.records.create(new_video(video.clone())).await.unwrap();
        age(&h, &video, 48).await;

        let kept = h.bucket.store_preview(b"p1".to_vec()).await.unwrap();
        let meta = ExtractedMetadata::new(30.0, 300, 640, 480);
        h.records
            .update(record.id, VideoPatch::ready(&meta, kept.clone()))
            .await
            .unwrap();
        age(&h, &kept, 48).await;

        let stale = h.bucket.store_preview(b"p0".to_vec()).await.unwrap();
        age(&h, &stale, 48).await;

        let report = h
            .reconciler
            .sweep_orphans(Duration::hours(24), false)
            .await
            .unwrap();

        assert_eq!(report.scanned, 3);
        assert_eq!(report.orphaned, vec![stale.as_str().to_string()]);
        assert!(h.bucket.fetch(&stale).await.is_err());
        assert_ok!(h.bucket.fetch(&kept).await);
        assert_ok!(h.bucket.fetch(&video).await);
    }

    #[tokio::test]
    async fn test_sweep_dry_run_keeps_blobs() {
        let h = harness();
        let orphan = h.bucket.store_video(b"b".to_vec()).await.unwrap();
        age(&h, &orphan, 2).await;

        let report = h
            .reconciler
            .sweep_orphans(Duration::hours(1), true)
            .await
            .unwrap();

        assert_eq!(report.orphaned.len(), 1);
        assert_eq!(report.deleted, 0);
        assert_ok!(h.bucket.fetch(&orphan).await);
    }

    #[tokio::test]
    async fn test_requeue_stale_processing_and_failed() {
        let h = harness();
        let key = ObjectKey::generate(KeyPurpose::Video);
        let stuck = h.records.create(new_video(key)).await.unwrap();

        let key = ObjectKey::generate(KeyPurpose::Video);
        let failed = h.records.create(new_video(key)).await.unwrap();
        h.records.update(failed.id, VideoPatch::failed()).await.unwrap();

        let key = ObjectKey::generate(KeyPurpose::Video);
        let fresh = h.records.create(new_video(key)).await.unwrap();

        let old = Utc::now() - Duration::hours(3);
        assert!(h.records.set_uploaded_at(stuck.id, old).await);
        assert!(h.records.set_uploaded_at(failed.id, old).await);

        let report = h
            .reconciler
            .requeue_stale(Duration::hours(1), false, 100, false)
            .await
            .unwrap();
        assert_eq!(report.processing, 1);
        assert_eq!(report.failed, 0);

        // The first job for `stuck` is still queued
        let report = h
            .reconciler
            .requeue_stale(Duration::hours(1), true, 100, false)
            .await
            .unwrap();
        assert_eq!(report.processing, 0);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.errors, 0);

        let jobs = h.queue.jobs().await;
        assert_eq!(jobs.len(), 2);
        assert!(jobs.iter().all(|j| j.video_id != fresh.id));
        let forced = jobs.iter().find(|j| j.video_id == failed.id).unwrap();
        assert!(forced.force);
    }

    #[tokio::test]
    async fn test_requeue_dry_run_enqueues_nothing() {
        let h = harness();
        let key = ObjectKey::generate(KeyPurpose::Video);
        let stuck = h.records.create(new_video(key)).await.unwrap();
        h.records
            .set_uploaded_at(stuck.id, Utc::now() - Duration::hours(3))
            .await;

        let report = h
            .reconciler
            .requeue_stale(Duration::hours(1), true, 100, true)
            .await
            .unwrap();

        assert_eq!(report.processing, 1);
        assert!(h.queue.is_empty().await);
    }

    #[tokio::test]
    async fn test_requeue_skips_record_with_live_job() {
        let h = harness();
        let key = ObjectKey::generate(KeyPurpose::Video);
        let slow = h.records.create(new_video(key)).await.unwrap();
        h.records
            .set_uploaded_at(slow.id, Utc::now() - Duration::hours(3))
            .await;
        h.queue
            .enqueue_process(ProcessVideoJob::new(slow.id))
            .await
            .unwrap();

        let report = h
            .reconciler
            .requeue_stale(Duration::hours(1), false, 100, false)
            .await
            .unwrap();

        assert_eq!(report.processing, 0);
        assert_eq!(report.skipped, 1);
        assert_eq!(h.queue.len().await, 1);
    }

    #[tokio::test]
    async fn test_requeue_fails_when_queue_unreadable() {
        let h = harness();
        let key = ObjectKey::generate(KeyPurpose::Video);
        let stuck = h.records.create(new_video(key)).await.unwrap();
        h.records
            .set_uploaded_at(stuck.id, Utc::now() - Duration::hours(3))
            .await;
        h.queue.set_unavailable(true);

        assert_err!(
            h.reconciler
                .requeue_stale(Duration::hours(1), false, 100, false)
                .await
        );
        assert!(h.queue.is_empty().await);
    }
}
