//! In-process [`VideoStore`] for local runs and tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use ueye_models::{
    validate_title, NewVideo, ObjectKey, VideoId, VideoPatch, VideoRecord, VideoStatus,
};

use crate::error::DbResult;
use crate::store::VideoStore;

/// Records kept in a map with a sequence-backed id.
#[derive(Debug)]
pub struct MemoryVideoStore {
    records: RwLock<BTreeMap<VideoId, VideoRecord>>,
    next_id: AtomicI64,
}

impl Default for MemoryVideoStore {
    fn default() -> Self {
        Self {
            records: RwLock::new(BTreeMap::new()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl MemoryVideoStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    /// Insert a fully formed record, replacing any with the same id.
    pub async fn insert(&self, record: VideoRecord) {
        self.next_id.fetch_max(record.id.0 + 1, Ordering::SeqCst);
        self.records.write().await.insert(record.id, record);
    }

    /// Backdate a record's upload time.
    pub async fn set_uploaded_at(&self, id: VideoId, at: DateTime<Utc>) -> bool {
        match self.records.write().await.get_mut(&id) {
            Some(record) => {
                record.uploaded_at = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl VideoStore for MemoryVideoStore {
    async fn create(&self, new: NewVideo) -> DbResult<VideoRecord> {
        new.validate()?;
        let id = VideoId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let record = new.into_placeholder(id, Utc::now());
        self.records.write().await.insert(id, record.clone());
        Ok(record)
    }

    async fn get(&self, id: VideoId) -> DbResult<Option<VideoRecord>> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn update(&self, id: VideoId, patch: VideoPatch) -> DbResult<Option<VideoRecord>> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let mut records = self.records.write().await;
        Ok(records.get_mut(&id).map(|record| {
            patch.apply_to(record);
            record.clone()
        }))
    }

    async fn exists_with_video_key(&self, key: &ObjectKey) -> DbResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| &r.video_key == key))
    }

    async fn exists_with_preview_key(&self, key: &ObjectKey) -> DbResult<bool> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .any(|r| r.preview_key.as_ref() == Some(key)))
    }

    async fn list_by_status(
        &self,
        status: VideoStatus,
        before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<VideoRecord>> {
        let mut matching: Vec<VideoRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.status == status && r.uploaded_at < before)
            .cloned()
            .collect();
        matching.sort_by_key(|r| r.uploaded_at);
        matching.truncate(limit as usize);
        Ok(matching)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ueye_models::{CameraId, ExtractedMetadata, KeyPurpose, TimeOfDay, UserId};
    use uuid::Uuid;

    use crate::error::DbError;

    fn new_video(title: &str) -> NewVideo {
        NewVideo {
            title: title.to_string(),
            time_of_day: TimeOfDay::Morning,
            camera_id: CameraId(Uuid::new_v4()),
            uploader_id: UserId(1),
            video_key: ObjectKey::generate(KeyPurpose::Video),
        }
    }

    #[tokio::test]
    async fn test_create_returns_placeholder() {
        let store = MemoryVideoStore::new();
        let first = store.create(new_video("first")).await.unwrap();
        let second = store.create(new_video("second")).await.unwrap();

        assert_eq!(first.id, VideoId(1));
        assert_eq!(second.id, VideoId(2));
        assert_eq!(first.status, VideoStatus::Processing);
        assert!(first.is_placeholder());
        assert_eq!(store.get(first.id).await.unwrap(), Some(first));
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title() {
        let store = MemoryVideoStore::new();
        let err = store.create(new_video("  ")).await.unwrap_err();
        assert!(matches!(err, DbError::Invalid(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_update_applies_only_supplied_fields() {
        let store = MemoryVideoStore::new();
        let created = store.create(new_video("clip")).await.unwrap();
        let meta = ExtractedMetadata::new(30.0, 300, 1920, 1080);
        let preview = ObjectKey::generate(KeyPurpose::Preview);

        let updated = store
            .update(created.id, VideoPatch::ready(&meta, preview.clone()))
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.status, VideoStatus::Ready);
        assert_eq!(updated.preview_key, Some(preview));
        assert_eq!(updated.duration, 10);
        assert_eq!(updated.video_resolution, "1920x1080");
        assert_eq!(updated.title, "clip");
        assert_eq!(updated.video_key, created.video_key);
    }

    #[tokio::test]
    async fn test_update_unknown_id_is_none() {
        let store = MemoryVideoStore::new();
        let result = store.update(VideoId(42), VideoPatch::failed()).await.unwrap();
        assert!(result.is_none());
        assert!(store.get(VideoId(42)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_status_is_oldest_first() {
        let store = MemoryVideoStore::new();
        let a = store.create(new_video("a")).await.unwrap();
        let b = store.create(new_video("b")).await.unwrap();
        let c = store.create(new_video("c")).await.unwrap();
        store.update(c.id, VideoPatch::failed()).await.unwrap();

        let now = Utc::now();
        store.set_uploaded_at(a.id, now - Duration::minutes(5)).await;
        store.set_uploaded_at(b.id, now - Duration::minutes(10)).await;

        let stale = store
            .list_by_status(VideoStatus::Processing, now, 10)
            .await
            .unwrap();
        let ids: Vec<_> = stale.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![b.id, a.id]);

        let limited = store
            .list_by_status(VideoStatus::Processing, now, 1)
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[tokio::test]
    async fn test_exists_with_video_key() {
        let store = MemoryVideoStore::new();
        let created = store.create(new_video("clip")).await.unwrap();

        assert!(store.exists_with_video_key(&created.video_key).await.unwrap());
        assert!(!store
            .exists_with_video_key(&ObjectKey::generate(KeyPurpose::Video))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_preview_reference_dropped_by_reset() {
        let store = MemoryVideoStore::new();
        let created = store.create(new_video("clip")).await.unwrap();
        let preview = ObjectKey::generate(KeyPurpose::Preview);
        let meta = ExtractedMetadata::new(24.0, 48, 320, 240);
        store
            .update(created.id, VideoPatch::ready(&meta, preview.clone()))
            .await
            .unwrap();
        assert!(store.exists_with_preview_key(&preview).await.unwrap());

        let reset = store
            .update(created.id, VideoPatch::reset())
            .await
            .unwrap()
            .unwrap();
        assert!(reset.is_placeholder());
        assert!(!store.exists_with_preview_key(&preview).await.unwrap());
    }
}
