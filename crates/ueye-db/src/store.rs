//! Video record store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use ueye_models::{NewVideo, ObjectKey, VideoId, VideoPatch, VideoRecord, VideoStatus};

use crate::error::DbResult;

/// CRUD over the durable video entity.
///
/// Every call commits on its own; updates are last-writer-wins.
#[async_trait]
pub trait VideoStore: Send + Sync {
    /// Insert a placeholder record (`processing`, zeroed metadata) and return it.
    async fn create(&self, new: NewVideo) -> DbResult<VideoRecord>;

    /// Fetch a record, `None` if the id is unknown.
    async fn get(&self, id: VideoId) -> DbResult<Option<VideoRecord>>;

    /// Apply the supplied fields only. `None` if the id is unknown.
    async fn update(&self, id: VideoId, patch: VideoPatch) -> DbResult<Option<VideoRecord>>;

    /// Whether any record references `key` as its raw video.
    async fn exists_with_video_key(&self, key: &ObjectKey) -> DbResult<bool>;

    /// Whether any record references `key` as its preview.
    async fn exists_with_preview_key(&self, key: &ObjectKey) -> DbResult<bool>;

    /// Oldest-first records in `status` uploaded before `before`.
    async fn list_by_status(
        &self,
        status: VideoStatus,
        before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<VideoRecord>>;
}
