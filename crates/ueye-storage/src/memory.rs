//! In-process object store for local runs and tests.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::{StorageError, StorageResult};
use crate::store::{ObjectInfo, ObjectStore};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    content_type: String,
    last_modified: DateTime<Utc>,
}

/// [`ObjectStore`] kept in memory, keyed by `(bucket, key)`.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: RwLock<BTreeMap<(String, String), StoredObject>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of objects across all buckets.
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Content type recorded for an object.
    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.content_type.clone())
    }

    /// Backdate an object, e.g. to push it past a sweep grace period.
    pub async fn set_last_modified(&self, bucket: &str, key: &str, at: DateTime<Utc>) -> bool {
        match self
            .objects
            .write()
            .await
            .get_mut(&(bucket.to_string(), key.to_string()))
        {
            Some(obj) => {
                obj.last_modified = at;
                true
            }
            None => false,
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()> {
        self.objects.write().await.insert(
            (bucket.to_string(), key.to_string()),
            StoredObject {
                data,
                content_type: content_type.to_string(),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>> {
        self.objects
            .read()
            .await
            .get(&(bucket.to_string(), key.to_string()))
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .objects
            .write()
            .await
            .remove(&(bucket.to_string(), key.to_string()))
            .is_some())
    }

    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>> {
        Ok(self
            .objects
            .read()
            .await
            .iter()
            .filter(|((b, k), _)| b == bucket && k.starts_with(prefix))
            .map(|((_, k), o)| ObjectInfo {
                key: k.clone(),
                size: o.data.len() as u64,
                last_modified: Some(o.last_modified),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_delete() {
        let store = MemoryObjectStore::new();
        store
            .put("urban-eye", "videos/a.mp4", b"raw".to_vec(), "video/mp4")
            .await
            .unwrap();

        assert_eq!(store.get("urban-eye", "videos/a.mp4").await.unwrap(), b"raw");
        assert_eq!(
            store.content_type("urban-eye", "videos/a.mp4").await.as_deref(),
            Some("video/mp4")
        );

        assert!(store.delete("urban-eye", "videos/a.mp4").await.unwrap());
        assert!(!store.delete("urban-eye", "videos/a.mp4").await.unwrap());
        assert!(store.get("urban-eye", "videos/a.mp4").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_buckets_are_isolated() {
        let store = MemoryObjectStore::new();
        store.put("a", "videos/x.mp4", vec![1], "video/mp4").await.unwrap();

        assert!(store.get("b", "videos/x.mp4").await.is_err());
        assert!(store.list("b", "videos/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_list_filters_by_prefix() {
        let store = MemoryObjectStore::new();
        store.put("a", "videos/1.mp4", vec![1, 2], "video/mp4").await.unwrap();
        store.put("a", "previews/1.jpg", vec![3], "image/jpeg").await.unwrap();

        let videos = store.list("a", "videos/").await.unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].key, "videos/1.mp4");
        assert_eq!(videos[0].size, 2);
    }
}
