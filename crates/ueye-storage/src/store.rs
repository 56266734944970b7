//! Object store abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageResult;

/// Bucket-scoped blob storage keyed by string.
///
/// Implementations wrap every transport or auth failure in a
/// [`StorageError`](crate::StorageError).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `data` under `key`, replacing any existing object.
    async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Vec<u8>,
        content_type: &str,
    ) -> StorageResult<()>;

    /// Fetch the full object. A missing key is `StorageError::NotFound`.
    async fn get(&self, bucket: &str, key: &str) -> StorageResult<Vec<u8>>;

    /// Delete an object. Returns `false` when the key did not exist.
    async fn delete(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// List objects whose key starts with `prefix`.
    async fn list(&self, bucket: &str, prefix: &str) -> StorageResult<Vec<ObjectInfo>>;
}

/// Information about a stored object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Object key
    pub key: String,
    /// Size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub last_modified: Option<DateTime<Utc>>,
}
