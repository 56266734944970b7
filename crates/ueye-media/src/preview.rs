//! First-frame preview generation.

use std::path::Path;

use image::ImageFormat;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::scratch::ScratchFile;

/// JPEG quality scale passed to the mjpeg encoder (2 = best, 31 = worst).
const PREVIEW_QUALITY: &str = "3";

/// Upper bound for a single-frame decode.
const PREVIEW_TIMEOUT_SECS: u64 = 60;

/// Decode the first frame of a raw video payload and encode it as JPEG.
///
/// Fails with [`MediaError::FrameExtraction`] when no frame can be read.
/// The scratch copy of the payload is removed on every exit path.
pub async fn generate_preview(bytes: &[u8], scratch_dir: Option<&Path>) -> MediaResult<Vec<u8>> {
    if bytes.is_empty() {
        return Err(MediaError::frame_extraction("input is empty"));
    }

    let scratch = ScratchFile::write(scratch_dir, bytes).await?;
    let cmd = preview_command(scratch.path());

    let result = FfmpegRunner::new()
        .with_timeout(PREVIEW_TIMEOUT_SECS)
        .run_capture(&cmd)
        .await;
    scratch.close()?;

    let jpeg = match result {
        Ok(jpeg) => jpeg,
        Err(MediaError::FfmpegFailed { stderr, .. }) => {
            return Err(MediaError::frame_extraction(
                stderr.unwrap_or_else(|| "ffmpeg could not decode a frame".to_string()),
            ));
        }
        Err(e) => return Err(e),
    };

    ensure_jpeg(&jpeg)?;
    debug!("Generated {} byte preview", jpeg.len());
    Ok(jpeg)
}

fn preview_command(input: &Path) -> FfmpegCommand {
    FfmpegCommand::to_stdout(input)
        .single_frame()
        .video_codec("mjpeg")
        .output_arg("-q:v")
        .output_arg(PREVIEW_QUALITY)
        .format("image2pipe")
        .log_level("error")
}

/// A zero-frame input makes ffmpeg exit cleanly with no output, so the bytes are checked.
fn ensure_jpeg(bytes: &[u8]) -> MediaResult<()> {
    if bytes.is_empty() {
        return Err(MediaError::frame_extraction("no decodable frame in stream"));
    }
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => Ok(()),
        _ => Err(MediaError::frame_extraction("encoder did not produce a JPEG image")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_preview_command_is_single_jpeg_frame() {
        let args = preview_command(Path::new("/tmp/in.mp4")).build_args();
        assert!(args.windows(2).any(|w| w == ["-frames:v", "1"]));
        assert!(args.windows(2).any(|w| w == ["-c:v", "mjpeg"]));
        assert!(args.windows(2).any(|w| w == ["-f", "image2pipe"]));
    }

    #[test]
    fn test_ensure_jpeg() {
        assert!(ensure_jpeg(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]).is_ok());
        assert!(matches!(
            ensure_jpeg(&[]),
            Err(MediaError::FrameExtraction(_))
        ));
        assert!(matches!(
            ensure_jpeg(b"\x89PNG\r\n\x1a\n"),
            Err(MediaError::FrameExtraction(_))
        ));
    }

    #[tokio::test]
    async fn test_empty_input_is_frame_extraction_error() {
        let dir = TempDir::new().unwrap();
        let err = generate_preview(&[], Some(dir.path())).await.unwrap_err();

        assert!(matches!(err, MediaError::FrameExtraction(_)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_input_leaves_no_scratch_file() {
        let dir = TempDir::new().unwrap();
        let err = generate_preview(b"garbage bytes", Some(dir.path()))
            .await
            .unwrap_err();

        assert!(
            matches!(err, MediaError::FrameExtraction(_) | MediaError::FfmpegNotFound),
            "unexpected error: {}",
            err
        );
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
