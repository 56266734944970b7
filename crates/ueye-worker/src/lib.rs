//! Video post-processing worker.
//!
//! This crate provides:
//! - The post-processing task that turns a placeholder record into a `ready`
//!   or `failed` one
//! - Job executor over the Redis Streams queue (bounded concurrency, crash
//!   recovery, dead-lettering)
//! - Reconciliation sweeps for orphaned blobs and stale records
//! - Graceful shutdown

pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod metrics;
pub mod processor;
pub mod reconcile;
pub mod retry;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use executor::{disposition, Disposition, JobExecutor};
pub use logging::{init_tracing, JobLogger};
pub use processor::{process_video, OutcomeStatus, ProcessingContext, ProcessingOutcome, Step};
pub use reconcile::{OrphanReport, Reconciler, RequeueReport};
pub use retry::{retry_transient, Backoff, ErrorLogGate, Retried};
