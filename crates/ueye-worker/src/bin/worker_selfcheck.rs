use std::path::Path;

use ueye_media::{check_ffmpeg, check_ffprobe};
use ueye_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env();

    let scratch = config
        .scratch_dir
        .clone()
        .unwrap_or_else(std::env::temp_dir);
    println!(
        "worker-selfcheck: starting with scratch_dir={}",
        scratch.display()
    );

    ensure_scratch_dir(&scratch).await?;
    ensure_tools()?;
    ensure_env_present(&["REDIS_URL", "DATABASE_URL"])?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_scratch_dir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = tempfile::NamedTempFile::new_in(path)
        .map_err(|e| anyhow::anyhow!("scratch dir {} not writable: {}", path.display(), e))?;
    drop(probe);
    Ok(())
}

fn ensure_tools() -> anyhow::Result<()> {
    let ffmpeg = check_ffmpeg().map_err(|e| anyhow::anyhow!("ffmpeg not available: {}", e))?;
    let ffprobe = check_ffprobe().map_err(|e| anyhow::anyhow!("ffprobe not available: {}", e))?;
    println!(
        "worker-selfcheck: ffmpeg={} ffprobe={}",
        ffmpeg.display(),
        ffprobe.display()
    );
    Ok(())
}

fn ensure_env_present(vars: &[&str]) -> anyhow::Result<()> {
    for var in vars {
        if std::env::var(var).is_err() {
            return Err(anyhow::anyhow!("missing required env var {}", var));
        }
    }
    Ok(())
}
