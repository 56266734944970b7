//! Video post-processing worker binary.

use std::sync::Arc;

use tracing::{error, info};

use ueye_db::PgVideoStore;
use ueye_media::FfmpegToolkit;
use ueye_queue::JobQueue;
use ueye_storage::{MediaBucket, S3ObjectStore};
use ueye_worker::{init_tracing, metrics, JobExecutor, ProcessingContext, WorkerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    info!("Starting ueye-worker");

    let config = WorkerConfig::from_env();
    info!("Worker config: {:?}", config);

    if let Some(port) = config.metrics_port {
        metrics::init_exporter(port)?;
        info!(port, "Prometheus exporter listening");
    }

    let records = Arc::new(PgVideoStore::from_env().await?);
    let bucket = MediaBucket::new(Arc::new(S3ObjectStore::from_env()?), config.bucket.clone());
    let media = Arc::new(match &config.scratch_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await?;
            FfmpegToolkit::with_scratch_dir(dir)
        }
        None => FfmpegToolkit::new(),
    });

    let ctx = ProcessingContext::new(records, bucket, media)
        .with_mark_failed_retries(config.mark_failed_retries);
    let queue = JobQueue::from_env()?;
    let executor = Arc::new(JobExecutor::new(config, queue, ctx));

    let signal_executor = Arc::clone(&executor);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal");
            signal_executor.shutdown();
        }
    });

    if let Err(e) = executor.run().await {
        error!("Executor error: {}", e);
        return Err(e.into());
    }

    info!("Worker shutdown complete");
    Ok(())
}
