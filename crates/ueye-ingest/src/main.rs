//! Command-line entry point for uploading local files.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use ueye_db::{DatabaseConfig, PgVideoStore, VideoStore};
use ueye_ingest::{IngestConfig, UploadOrchestrator, UploadRequest};
use ueye_models::{CameraId, TimeOfDay, UserId, VideoId};
use ueye_queue::JobQueue;
use ueye_storage::{MediaBucket, S3Config, S3ObjectStore};

#[derive(Parser)]
#[command(name = "ueye-ingest")]
#[command(about = "Upload street-camera videos into the processing pipeline")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a video file and enqueue post-processing
    Upload {
        /// Path to the video file
        file: PathBuf,

        /// Display title
        #[arg(short, long)]
        title: String,

        /// morning, day, evening or night
        #[arg(long)]
        time_of_day: TimeOfDay,

        /// Camera that recorded the video
        #[arg(long)]
        camera_id: Uuid,

        /// Uploading user
        #[arg(long)]
        uploader_id: i64,
    },

    /// Print a video record as JSON
    Status {
        /// Video record id
        video_id: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing(cli.verbose)?;

    let db_config = DatabaseConfig::from_env()?;
    let records = Arc::new(PgVideoStore::connect(&db_config).await?);

    match cli.command {
        Commands::Upload {
            file,
            title,
            time_of_day,
            camera_id,
            uploader_id,
        } => {
            let config = IngestConfig::from_env();
            let store = S3ObjectStore::new(&S3Config::from_env())?;
            let bucket = MediaBucket::new(Arc::new(store), config.bucket.clone());
            let queue = JobQueue::from_env()?;
            queue.init().await?;

            let orchestrator = UploadOrchestrator::new(records, bucket, Arc::new(queue), config);

            let filename = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let body = tokio::fs::File::open(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;

            let record = orchestrator
                .upload(
                    UploadRequest {
                        filename,
                        title,
                        time_of_day,
                        camera_id: CameraId(camera_id),
                        uploader_id: UserId(uploader_id),
                    },
                    body,
                )
                .await?;

            info!(video_id = %record.id, "Upload complete, processing enqueued");
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
        Commands::Status { video_id } => match records.get(VideoId(video_id)).await? {
            Some(record) => println!("{}", serde_json::to_string_pretty(&record)?),
            None => anyhow::bail!("Video {} not found", video_id),
        },
    }

    Ok(())
}

fn init_tracing(verbose: bool) -> Result<()> {
    let default_level = if verbose { "ueye=debug" } else { "ueye=info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
    Ok(())
}
