//! Metadata extracted from a raw video file.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Container-level properties of a decoded video stream.
///
/// Produced once per extraction call and copied into the owning
/// [`VideoRecord`](crate::VideoRecord) when processing succeeds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedMetadata {
    /// Frames per second
    pub fps: f64,
    /// Total number of frames
    pub frame_count: u64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Duration in seconds (`frame_count / fps`, zero when fps is zero)
    pub duration_sec: f64,
    /// `<width>x<height>`
    pub video_resolution: String,
}

impl ExtractedMetadata {
    /// Build metadata from raw stream properties, deriving duration and resolution.
    pub fn new(fps: f64, frame_count: u64, width: u32, height: u32) -> Self {
        let fps = if fps.is_finite() && fps > 0.0 { fps } else { 0.0 };
        let duration_sec = if fps != 0.0 {
            frame_count as f64 / fps
        } else {
            0.0
        };

        Self {
            fps,
            frame_count,
            width,
            height,
            duration_sec,
            video_resolution: format_resolution(width, height),
        }
    }

    /// Duration rounded to whole seconds, as stored on the record.
    pub fn duration_whole_secs(&self) -> i32 {
        let rounded = self.duration_sec.round();
        if rounded >= i32::MAX as f64 {
            i32::MAX
        } else {
            rounded as i32
        }
    }
}

/// Compose the `<width>x<height>` resolution string.
pub fn format_resolution(width: u32, height: u32) -> String {
    format!("{}x{}", width, height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_hd_clip() {
        let meta = ExtractedMetadata::new(30.0, 300, 1920, 1080);
        assert_eq!(meta.fps, 30.0);
        assert_eq!(meta.frame_count, 300);
        assert!((meta.duration_sec - 10.0).abs() < f64::EPSILON);
        assert_eq!(meta.video_resolution, "1920x1080");
        assert_eq!(meta.duration_whole_secs(), 10);
    }

    #[test]
    fn test_zero_fps_gives_zero_duration() {
        let meta = ExtractedMetadata::new(0.0, 300, 640, 480);
        assert_eq!(meta.duration_sec, 0.0);
        assert_eq!(meta.duration_whole_secs(), 0);
    }

    #[test]
    fn test_non_finite_fps_treated_as_zero() {
        let meta = ExtractedMetadata::new(f64::NAN, 10, 1, 1);
        assert_eq!(meta.fps, 0.0);
        assert_eq!(meta.duration_sec, 0.0);
    }

    #[test]
    fn test_fractional_duration_rounds() {
        let meta = ExtractedMetadata::new(29.97, 300, 1280, 720);
        assert!((meta.duration_sec - 10.01).abs() < 0.01);
        assert_eq!(meta.duration_whole_secs(), 10);
    }
}
