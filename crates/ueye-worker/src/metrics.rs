//! Prometheus metrics for the worker and the sweeps.

use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_PROCESSED_TOTAL: &str = "ueye_jobs_processed_total";
    pub const JOB_DURATION_SECONDS: &str = "ueye_job_duration_seconds";
    pub const VIDEOS_STUCK_TOTAL: &str = "ueye_videos_stuck_total";
    pub const JOBS_DEAD_LETTERED_TOTAL: &str = "ueye_jobs_dead_lettered_total";
    pub const ORPHANS_FOUND_TOTAL: &str = "ueye_orphaned_blobs_found_total";
    pub const ORPHANS_DELETED_TOTAL: &str = "ueye_orphaned_blobs_deleted_total";
    pub const RECORDS_REQUEUED_TOTAL: &str = "ueye_records_requeued_total";
}

/// Serve `/metrics` on `0.0.0.0:port`.
pub fn init_exporter(port: u16) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)))
        .install()
        .map_err(|e| WorkerError::config_error(format!("Prometheus exporter: {}", e)))
}

pub fn record_outcome(status: &'static str, elapsed: Duration) {
    counter!(names::JOBS_PROCESSED_TOTAL, "status" => status).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "status" => status).record(elapsed.as_secs_f64());
}

pub fn record_stuck() {
    counter!(names::VIDEOS_STUCK_TOTAL).increment(1);
}

pub fn record_dead_lettered() {
    counter!(names::JOBS_DEAD_LETTERED_TOTAL).increment(1);
}

pub fn record_orphans(found: usize, deleted: usize) {
    counter!(names::ORPHANS_FOUND_TOTAL).increment(found as u64);
    counter!(names::ORPHANS_DELETED_TOTAL).increment(deleted as u64);
}

pub fn record_requeued(status: &'static str, count: usize) {
    counter!(names::RECORDS_REQUEUED_TOTAL, "status" => status).increment(count as u64);
}
