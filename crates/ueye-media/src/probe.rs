//! FFprobe metadata extraction.

use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

use ueye_models::ExtractedMetadata;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};
use crate::scratch::ScratchFile;

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Extract container-level metadata from a raw video payload.
///
/// The payload is written to a scratch file under `scratch_dir` which is
/// removed before this function returns, whether or not probing succeeds.
/// Fails with [`MediaError::Decode`] when the stream cannot be opened.
pub async fn extract_metadata(
    bytes: &[u8],
    scratch_dir: Option<&Path>,
) -> MediaResult<ExtractedMetadata> {
    if bytes.is_empty() {
        return Err(MediaError::decode("input is empty"));
    }

    check_ffprobe()?;

    let scratch = ScratchFile::write(scratch_dir, bytes).await?;
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-select_streams",
            "v:0",
            "-show_entries",
            "stream=width,height,r_frame_rate,avg_frame_rate,nb_frames,duration:format=duration",
            "-print_format",
            "json",
        ])
        .arg(scratch.path())
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output()
        .await?;
    scratch.close()?;

    if !output.status.success() {
        return Err(MediaError::decode(format!(
            "ffprobe could not open stream: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let metadata = parse_probe_output(&output.stdout)?;
    debug!(
        fps = metadata.fps,
        frame_count = metadata.frame_count,
        resolution = %metadata.video_resolution,
        "Extracted video metadata"
    );
    Ok(metadata)
}

/// Turn ffprobe's JSON report into [`ExtractedMetadata`].
///
/// Uses the declared frame count when the container carries one, otherwise
/// estimates it from the stream duration.
pub fn parse_probe_output(json: &[u8]) -> MediaResult<ExtractedMetadata> {
    let probe: FfprobeOutput = serde_json::from_slice(json)
        .map_err(|e| MediaError::decode(format!("unreadable ffprobe output: {}", e)))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::decode("no video stream found"))?;

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(0.0);

    let frame_count = match stream.nb_frames.as_deref().and_then(|n| n.parse::<u64>().ok()) {
        Some(count) => count,
        None => {
            let duration = stream
                .duration
                .as_deref()
                .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
                .and_then(|d| d.parse::<f64>().ok())
                .unwrap_or(0.0);
            (duration * fps).round().max(0.0) as u64
        }
    };

    Ok(ExtractedMetadata::new(
        fps,
        frame_count,
        stream.width.unwrap_or(0),
        stream.height.unwrap_or(0),
    ))
}

/// Parse frame rate string (e.g., "30/1" or "29.97"). "0/0" yields `None`.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den == 0.0 {
            return None;
        }
        num / den
    } else {
        s.parse().ok()?
    };

    (rate.is_finite() && rate > 0.0).then_some(rate)
}
