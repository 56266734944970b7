//! Upload orchestration for the Urban Eye video pipeline.
//!
//! The synchronous half of ingestion: validate, store the raw bytes, create a
//! `processing` placeholder record and enqueue post-processing.

pub mod config;
pub mod error;
pub mod metrics;
pub mod upload;

pub use config::IngestConfig;
pub use error::{UploadError, UploadResult};
pub use upload::{UploadOrchestrator, UploadRequest};
