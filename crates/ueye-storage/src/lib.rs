//! Object store gateway for raw videos and previews.
//!
//! This crate provides:
//! - The [`ObjectStore`] trait (put/get/delete/list per bucket)
//! - An S3-compatible implementation for MinIO or AWS
//! - An in-memory implementation for local runs and tests
//! - [`MediaBucket`], which generates `videos/` and `previews/` keys

pub mod bucket;
pub mod error;
pub mod memory;
pub mod s3;
pub mod store;

pub use bucket::{DeletedAssets, MediaBucket};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryObjectStore;
pub use s3::{S3Config, S3ObjectStore};
pub use store::{ObjectInfo, ObjectStore};
