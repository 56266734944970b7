//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Job timeout
    pub job_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Directory for decoder scratch files (system temp dir when unset)
    pub scratch_dir: Option<PathBuf>,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Retries for the best-effort `failed` update
    pub mark_failed_retries: u32,
    /// Bucket holding raw videos and previews
    pub bucket: String,
    /// Serve Prometheus metrics on this port when set
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            job_timeout: Duration::from_secs(600),
            shutdown_timeout: Duration::from_secs(30),
            scratch_dir: None,
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(900), // must exceed job_timeout
            mark_failed_retries: 3,
            bucket: "urban-eye".to_string(),
            metrics_port: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let secs = |name: &str, default: Duration| secs_or(std::env::var(name).ok(), default);

        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            job_timeout: secs("WORKER_JOB_TIMEOUT", defaults.job_timeout),
            shutdown_timeout: secs("WORKER_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            scratch_dir: std::env::var("WORKER_SCRATCH_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            claim_interval: secs("WORKER_CLAIM_INTERVAL_SECS", defaults.claim_interval),
            claim_min_idle: secs("WORKER_CLAIM_MIN_IDLE_SECS", defaults.claim_min_idle),
            mark_failed_retries: std::env::var("WORKER_MARK_FAILED_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.mark_failed_retries),
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            metrics_port: std::env::var("METRICS_PORT")
                .ok()
                .and_then(|s| s.parse().ok()),
        }
    }
}

/// Positive whole seconds from `value`, else `default`.
/// `tokio::time::interval` panics on a zero period.
fn secs_or(value: Option<String>, default: Duration) -> Duration {
    value
        .and_then(|s| s.trim().parse::<u64>().ok())
        .filter(|n| *n > 0)
        .map(Duration::from_secs)
        .unwrap_or(default)
}
