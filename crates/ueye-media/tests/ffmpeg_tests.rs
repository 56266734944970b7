//! Media tests against real ffmpeg/ffprobe binaries.

use std::path::Path;
use std::process::Command;

use tempfile::TempDir;
use ueye_media::{FfmpegToolkit, MediaError, MediaToolkit};

/// Render a synthetic H.264 clip with ffmpeg's test source.
fn render_clip(dir: &Path, seconds: u32, fps: u32, size: &str) -> Vec<u8> {
    let path = dir.join("clip.mp4");
    let status = Command::new("ffmpeg")
        .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
        .arg(format!("testsrc=duration={}:size={}:rate={}", seconds, size, fps))
        .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
        .arg(&path)
        .status()
        .expect("failed to spawn ffmpeg");
    assert!(status.success(), "ffmpeg could not render test clip");
    std::fs::read(&path).expect("rendered clip missing")
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_full_hd_clip_metadata() {
    let workdir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let bytes = render_clip(workdir.path(), 10, 30, "1920x1080");

    let toolkit = FfmpegToolkit::with_scratch_dir(scratch.path());
    let meta = toolkit.extract_metadata(&bytes).await.unwrap();

    assert_eq!(meta.fps, 30.0);
    assert_eq!(meta.frame_count, 300);
    assert_eq!(meta.width, 1920);
    assert_eq!(meta.height, 1080);
    assert!((meta.duration_sec - 10.0).abs() < 1e-9);
    assert_eq!(meta.video_resolution, "1920x1080");
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_preview_is_jpeg() {
    let workdir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let bytes = render_clip(workdir.path(), 1, 25, "320x240");

    let toolkit = FfmpegToolkit::with_scratch_dir(scratch.path());
    let jpeg = toolkit.generate_preview(&bytes).await.unwrap();

    assert!(jpeg.starts_with(&[0xFF, 0xD8, 0xFF]));
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_truncated_clip_fails_to_decode() {
    let workdir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let bytes = render_clip(workdir.path(), 1, 25, "320x240");

    let toolkit = FfmpegToolkit::with_scratch_dir(scratch.path());
    let err = toolkit.extract_metadata(&bytes[..16]).await.unwrap_err();

    assert!(matches!(err, MediaError::Decode(_)), "unexpected error: {}", err);
    assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
}
