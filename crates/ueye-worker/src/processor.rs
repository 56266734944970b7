//! Deferred half of ingestion: derive metadata and a preview for one record.
//!
//! `process_video` never returns an error. Every failure is logged, the
//! record is marked `failed` best-effort, and the caller gets a
//! [`ProcessingOutcome`] describing what happened.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;
use ueye_db::{DbError, VideoStore};
use ueye_media::MediaToolkit;
use ueye_models::{ObjectKey, VideoId, VideoPatch, VideoRecord};
use ueye_queue::ProcessVideoJob;
use ueye_storage::MediaBucket;

use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_transient, Backoff, Retried};

/// Shared collaborators for post-processing runs.
///
/// Holds handles only; every run checks its own database connection out of
/// the pool and returns it when the call completes.
pub struct ProcessingContext {
    pub records: Arc<dyn VideoStore>,
    pub bucket: MediaBucket,
    pub media: Arc<dyn MediaToolkit>,
    /// Budget for the `failed` update when the store errors transiently
    pub mark_failed_backoff: Backoff,
}

impl ProcessingContext {
    pub fn new(
        records: Arc<dyn VideoStore>,
        bucket: MediaBucket,
        media: Arc<dyn MediaToolkit>,
    ) -> Self {
        Self {
            records,
            bucket,
            media,
            mark_failed_backoff: Backoff::new(3),
        }
    }

    pub fn with_mark_failed_retries(mut self, retries: u32) -> Self {
        self.mark_failed_backoff.retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.mark_failed_backoff = self.mark_failed_backoff.with_base(delay);
        self
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    /// Record is `ready`
    Success,
    /// Record is `failed`
    Failed,
    /// No record with this id, nothing to update
    NotFound,
    /// Record already terminal and the job was not forced
    Skipped,
    /// Could not bring the record to a terminal state
    Stuck,
}

impl OutcomeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutcomeStatus::Success => "success",
            OutcomeStatus::Failed => "failed",
            OutcomeStatus::NotFound => "not_found",
            OutcomeStatus::Skipped => "skipped",
            OutcomeStatus::Stuck => "stuck",
        }
    }

    /// Whether the queue message can be acknowledged.
    pub fn is_settled(&self) -> bool {
        !matches!(self, OutcomeStatus::Stuck)
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured result of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessingOutcome {
    pub video_id: VideoId,
    pub status: OutcomeStatus,
    pub message: String,
    /// Final record state, when it could be read back
    pub record: Option<VideoRecord>,
}

impl ProcessingOutcome {
    fn new(video_id: VideoId, status: OutcomeStatus, message: impl Into<String>) -> Self {
        Self {
            video_id,
            status,
            message: message.into(),
            record: None,
        }
    }

    fn with_record(mut self, record: VideoRecord) -> Self {
        self.record = Some(record);
        self
    }
}

/// Pipeline step that failed, for messages and logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Download,
    Extract,
    Preview,
    UploadPreview,
    Finalize,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch_record",
            Step::Download => "download",
            Step::Extract => "extract_metadata",
            Step::Preview => "generate_preview",
            Step::UploadPreview => "upload_preview",
            Step::Finalize => "finalize_record",
        }
    }
}

/// Run post-processing for one job.
pub async fn process_video(ctx: &ProcessingContext, job: &ProcessVideoJob) -> ProcessingOutcome {
    let logger = JobLogger::new(&job.job_id, job.video_id, "process_video");
    let span = logger.create_span();
    let started = Instant::now();

    let outcome = run(ctx, job, &logger).instrument(span).await;

    metrics::record_outcome(outcome.status.as_str(), started.elapsed());
    if outcome.status == OutcomeStatus::Stuck {
        metrics::record_stuck();
    }
    outcome
}

async fn run(
    ctx: &ProcessingContext,
    job: &ProcessVideoJob,
    logger: &JobLogger,
) -> ProcessingOutcome {
    let video_id = job.video_id;
    logger.log_start(if job.force { "forced run" } else { "new upload" });

    let record = match ctx.records.get(video_id).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            logger.log_warning("video record not found, nothing to do");
            return ProcessingOutcome::new(video_id, OutcomeStatus::NotFound, "record not found");
        }
        Err(e) => {
            // Record state unknown; leave it for redelivery
            let message = format!("{}: {}", Step::Fetch.as_str(), e);
            logger.log_error(&message);
            return ProcessingOutcome::new(video_id, OutcomeStatus::Stuck, message);
        }
    };

    let record = if record.status.is_terminal() {
        if !job.force {
            logger.log_progress(&format!("record already {}, skipping", record.status));
            return ProcessingOutcome::new(
                video_id,
                OutcomeStatus::Skipped,
                format!("already {}", record.status),
            )
            .with_record(record);
        }
        match reopen(ctx, &record).await {
            Ok(Some(reopened)) => {
                if let Some(old) = &record.preview_key {
                    discard_preview(ctx, old, logger).await;
                }
                reopened
            }
            Ok(None) => {
                let status = OutcomeStatus::NotFound;
                return ProcessingOutcome::new(video_id, status, "record not found");
            }
            Err(message) => {
                logger.log_error(&message);
                return ProcessingOutcome::new(video_id, OutcomeStatus::Stuck, message);
            }
        }
    } else {
        record
    };

    match derive_and_finalize(ctx, &record, logger).await {
        Ok(Some(ready)) => {
            logger.log_completion(&format!(
                "{} {}fps {}s",
                ready.video_resolution, ready.fps, ready.duration
            ));
            ProcessingOutcome::new(video_id, OutcomeStatus::Success, "ready").with_record(ready)
        }
        Ok(None) => {
            logger.log_warning("video record disappeared before finalize");
            ProcessingOutcome::new(
                video_id,
                OutcomeStatus::NotFound,
                "record deleted during processing",
            )
        }
        Err((step, message)) => {
            let message = format!("{}: {}", step.as_str(), message);
            logger.log_error(&message);
            mark_failed(ctx, video_id, message, logger).await
        }
    }
}

/// Steps 2-6. `Ok(None)` when the record vanished before the final update.
async fn derive_and_finalize(
    ctx: &ProcessingContext,
    record: &VideoRecord,
    logger: &JobLogger,
) -> Result<Option<VideoRecord>, (Step, String)> {
    let bytes = ctx
        .bucket
        .fetch(&record.video_key)
        .await
        .map_err(|e| (Step::Download, e.to_string()))?;
    logger.log_progress(&format!("downloaded {} bytes", bytes.len()));

    let metadata = ctx
        .media
        .extract_metadata(&bytes)
        .await
        .map_err(|e| (Step::Extract, e.to_string()))?;

    let preview = ctx
        .media
        .generate_preview(&bytes)
        .await
        .map_err(|e| (Step::Preview, e.to_string()))?;
    drop(bytes);

    let preview_key = ctx
        .bucket
        .store_preview(preview)
        .await
        .map_err(|e| (Step::UploadPreview, e.to_string()))?;
    logger.log_progress(&format!("stored preview {}", preview_key));

    match ctx
        .records
        .update(record.id, VideoPatch::ready(&metadata, preview_key.clone()))
        .await
    {
        Ok(Some(ready)) => Ok(Some(ready)),
        Ok(None) => {
            discard_preview(ctx, &preview_key, logger).await;
            Ok(None)
        }
        Err(e) => {
            discard_preview(ctx, &preview_key, logger).await;
            Err((Step::Finalize, e.to_string()))
        }
    }
}

/// Put a forced terminal record back to `processing` with placeholder
/// metadata and no preview.
async fn reopen(
    ctx: &ProcessingContext,
    record: &VideoRecord,
) -> Result<Option<VideoRecord>, String> {
    ctx.records
        .update(record.id, VideoPatch::reset())
        .await
        .map_err(|e| format!("reopen: {}", e))
}

async fn discard_preview(ctx: &ProcessingContext, key: &ObjectKey, logger: &JobLogger) {
    if let Err(e) = ctx.bucket.delete(key).await {
        logger.log_warning(&format!("could not delete preview {}: {}", key, e));
    }
}

/// Best-effort `failed` update. Its own failure is reported, never raised.
async fn mark_failed(
    ctx: &ProcessingContext,
    video_id: VideoId,
    reason: String,
    logger: &JobLogger,
) -> ProcessingOutcome {
    let result = retry_transient(&ctx.mark_failed_backoff, DbError::is_retryable, || {
        ctx.records.update(video_id, VideoPatch::failed())
    })
    .await;

    match result {
        Retried::Done(Some(record)) => {
            ProcessingOutcome::new(video_id, OutcomeStatus::Failed, reason).with_record(record)
        }
        Retried::Done(None) => {
            logger.log_warning("video record disappeared before it could be marked failed");
            ProcessingOutcome::new(video_id, OutcomeStatus::NotFound, reason)
        }
        Retried::GaveUp { error, attempts } => {
            logger.log_error(&format!(
                "could not mark record failed after {} attempts, left in processing: {}",
                attempts, error
            ));
            ProcessingOutcome::new(
                video_id,
                OutcomeStatus::Stuck,
                format!("{}; mark failed: {}", reason, error),
            )
        }
    }
}
