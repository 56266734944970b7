//! Shared data models for the Urban Eye video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Video records and their processing status
//! - Object-store keys namespaced by purpose
//! - Metadata extracted from raw video files
//! - Upload validation errors

pub mod error;
pub mod metadata;
pub mod object_key;
pub mod video;

// Re-export common types
pub use error::{ValidationError, ValidationResult};
pub use metadata::ExtractedMetadata;
pub use object_key::{KeyPurpose, ObjectKey};
pub use video::{
    validate_title, CameraId, NewVideo, TimeOfDay, UserId, VideoId, VideoPatch, VideoRecord,
    VideoStatus, MAX_TITLE_LEN, PLACEHOLDER_RESOLUTION,
};
