//! Operator sweeps for orphaned blobs and stale records.

use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use ueye_db::PgVideoStore;
use ueye_queue::JobQueue;
use ueye_storage::{MediaBucket, S3ObjectStore};
use ueye_worker::{init_tracing, Reconciler, WorkerConfig};

#[derive(Parser)]
#[command(name = "ueye-reconcile")]
#[command(about = "Clean up orphaned video blobs and requeue stale records")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Delete video and preview blobs that no record references
    Orphans {
        /// Ignore blobs younger than this, to spare in-flight uploads
        #[arg(long, default_value_t = 86_400)]
        grace_secs: i64,

        /// Report orphans without deleting them
        #[arg(long)]
        dry_run: bool,
    },

    /// Enqueue again records stuck in `processing` that have no queued job
    Requeue {
        /// Minimum record age
        #[arg(long, default_value_t = 3_600)]
        older_than_secs: i64,

        /// Also retry `failed` records (forced)
        #[arg(long)]
        include_failed: bool,

        /// Maximum records per status
        #[arg(long, default_value_t = 100)]
        limit: u32,

        /// List records without enqueueing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let config = WorkerConfig::from_env();
    let records = Arc::new(PgVideoStore::from_env().await?);
    let bucket = MediaBucket::new(Arc::new(S3ObjectStore::from_env()?), config.bucket);
    let queue = JobQueue::from_env()?;
    queue.init().await?;

    let reconciler = Reconciler::new(records, bucket, Arc::new(queue));

    match cli.command {
        Commands::Orphans {
            grace_secs,
            dry_run,
        } => {
            let report = reconciler
                .sweep_orphans(chrono::Duration::seconds(grace_secs), dry_run)
                .await?;
            for key in &report.orphaned {
                println!("{}", key);
            }
            info!(
                scanned = report.scanned,
                orphaned = report.orphaned.len(),
                deleted = report.deleted,
                "Done"
            );
        }
        Commands::Requeue {
            older_than_secs,
            include_failed,
            limit,
            dry_run,
        } => {
            let report = reconciler
                .requeue_stale(
                    chrono::Duration::seconds(older_than_secs),
                    include_failed,
                    limit,
                    dry_run,
                )
                .await?;
            println!(
                "processing={} failed={} skipped={} errors={}",
                report.processing, report.failed, report.skipped, report.errors
            );
            if report.errors > 0 {
                anyhow::bail!("{} records could not be requeued", report.errors);
            }
        }
    }

    Ok(())
}
