//! Key-generating facade over an [`ObjectStore`] bound to one bucket.

use std::sync::Arc;

use tracing::{debug, warn};
use ueye_models::{KeyPurpose, ObjectKey};

use crate::error::StorageResult;
use crate::store::{ObjectInfo, ObjectStore};

/// Outcome of deleting both blobs belonging to one video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeletedAssets {
    pub video: bool,
    pub preview: bool,
}

/// The pipeline's view of the object store: one bucket, purpose-namespaced keys.
#[derive(Clone)]
pub struct MediaBucket {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl MediaBucket {
    pub fn new(store: Arc<dyn ObjectStore>, bucket: impl Into<String>) -> Self {
        Self {
            store,
            bucket: bucket.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Store a blob under a freshly generated key for `purpose`.
    pub async fn store(&self, purpose: KeyPurpose, data: Vec<u8>) -> StorageResult<ObjectKey> {
        let key = ObjectKey::generate(purpose);
        self.store
            .put(&self.bucket, key.as_str(), data, purpose.content_type())
            .await?;
        Ok(key)
    }

    /// Store raw uploaded video bytes under `videos/<uuid>.mp4`.
    pub async fn store_video(&self, data: Vec<u8>) -> StorageResult<ObjectKey> {
        self.store(KeyPurpose::Video, data).await
    }

    /// Store encoded preview bytes under `previews/<uuid>.jpg`.
    pub async fn store_preview(&self, data: Vec<u8>) -> StorageResult<ObjectKey> {
        self.store(KeyPurpose::Preview, data).await
    }

    pub async fn fetch(&self, key: &ObjectKey) -> StorageResult<Vec<u8>> {
        self.store.get(&self.bucket, key.as_str()).await
    }

    /// Delete one blob; `false` when it was already gone.
    pub async fn delete(&self, key: &ObjectKey) -> StorageResult<bool> {
        self.store.delete(&self.bucket, key.as_str()).await
    }

    /// Delete the raw video and, if present, the preview of a record.
    ///
    /// Missing keys are tolerated. The preview is still attempted when the
    /// video deletion fails; the first error is returned.
    pub async fn delete_assets(
        &self,
        video_key: &ObjectKey,
        preview_key: Option<&ObjectKey>,
    ) -> StorageResult<DeletedAssets> {
        let video = self.delete(video_key).await;
        let preview = match preview_key {
            Some(key) => self.delete(key).await,
            None => Ok(false),
        };

        match (video, preview) {
            (Ok(video), Ok(preview)) => {
                debug!(%video_key, video, preview, "Deleted video assets");
                Ok(DeletedAssets { video, preview })
            }
            (Err(e), preview) => {
                if let Err(preview_err) = preview {
                    warn!(%video_key, error = %preview_err, "Preview deletion also failed");
                }
                Err(e)
            }
            (Ok(_), Err(e)) => Err(e),
        }
    }

    /// List stored blobs of one purpose.
    pub async fn list(&self, purpose: KeyPurpose) -> StorageResult<Vec<ObjectInfo>> {
        self.store.list(&self.bucket, purpose.prefix()).await
    }
}
