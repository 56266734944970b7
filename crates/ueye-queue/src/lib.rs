//! Redis Streams task queue.
//!
//! This crate provides:
//! - The `process_video` job message
//! - Job enqueueing with idempotency-key dedup
//! - Consumer-group consumption, pending-claim, retry counting and DLQ

pub mod error;
pub mod job;
pub mod memory;
pub mod queue;

pub use error::{QueueError, QueueResult};
pub use job::{JobId, ProcessVideoJob, QueueJob};
pub use memory::MemoryTaskQueue;
pub use queue::{Delivery, JobQueue, QueueConfig, TaskQueue};
