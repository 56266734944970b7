//! Video record models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{ValidationError, ValidationResult};
use crate::metadata::ExtractedMetadata;
use crate::object_key::ObjectKey;

/// Maximum title length in characters.
pub const MAX_TITLE_LEN: usize = 255;

/// Resolution stored on a record before processing completes.
pub const PLACEHOLDER_RESOLUTION: &str = "0x0";

/// Database identifier of a video record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct VideoId(pub i64);

impl VideoId {
    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for VideoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for VideoId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Identifier of the camera that recorded a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct CameraId(pub Uuid);

impl fmt::Display for CameraId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for CameraId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// Identifier of the (pre-authenticated) uploading user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// Time of day a video was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Day => "day",
            TimeOfDay::Evening => "evening",
            TimeOfDay::Night => "night",
        }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TimeOfDay {
    type Err = ValidationError;

    /// Accepts the English tags and the legacy localized ones
    /// (`утро`, `день`, `вечер`, `ночь`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "morning" | "утро" => Ok(TimeOfDay::Morning),
            "day" | "день" => Ok(TimeOfDay::Day),
            "evening" | "вечер" => Ok(TimeOfDay::Evening),
            "night" | "ночь" => Ok(TimeOfDay::Night),
            _ => Err(ValidationError::InvalidTimeOfDay(s.to_string())),
        }
    }
}

/// Processing status of a video record.
///
/// `Processing` moves to exactly one of the terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    /// Raw video stored, post-processing pending or running
    #[default]
    Processing,
    /// Metadata and preview available
    Ready,
    /// Post-processing failed
    Failed,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::Ready => "ready",
            VideoStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoStatus::Ready | VideoStatus::Failed)
    }

    /// Whether the pipeline may move a record from `self` to `next`.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Processing, VideoStatus::Ready)
                | (VideoStatus::Processing, VideoStatus::Failed)
        )
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "ready" => Ok(VideoStatus::Ready),
            "failed" => Ok(VideoStatus::Failed),
            other => Err(format!("unknown video status: {}", other)),
        }
    }
}

/// A stored video and its derived metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoRecord {
    pub id: VideoId,

    /// Display title (1..=255 characters)
    pub title: String,

    pub time_of_day: TimeOfDay,

    pub camera_id: CameraId,

    pub uploader_id: UserId,

    /// Key of the raw video blob, set at creation
    pub video_key: ObjectKey,

    /// Key of the preview image, absent until processing completes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_key: Option<ObjectKey>,

    /// Duration in whole seconds
    #[serde(default)]
    pub duration: i32,

    /// Frames per second
    #[serde(default)]
    pub fps: f64,

    /// `<width>x<height>`
    pub video_resolution: String,

    #[serde(default)]
    pub status: VideoStatus,

    pub uploaded_at: DateTime<Utc>,
}

impl VideoRecord {
    /// Whether this record still carries the zeroed placeholder metadata.
    pub fn is_placeholder(&self) -> bool {
        self.preview_key.is_none()
            && self.duration == 0
            && self.fps == 0.0
            && self.video_resolution == PLACEHOLDER_RESOLUTION
    }
}

/// Fields required to create a placeholder record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct NewVideo {
    pub title: String,
    pub time_of_day: TimeOfDay,
    pub camera_id: CameraId,
    pub uploader_id: UserId,
    pub video_key: ObjectKey,
}

impl NewVideo {
    pub fn validate(&self) -> ValidationResult<()> {
        validate_title(&self.title)
    }

    /// Materialize the placeholder record for this upload.
    pub fn into_placeholder(self, id: VideoId, uploaded_at: DateTime<Utc>) -> VideoRecord {
        VideoRecord {
            id,
            title: self.title,
            time_of_day: self.time_of_day,
            camera_id: self.camera_id,
            uploader_id: self.uploader_id,
            video_key: self.video_key,
            preview_key: None,
            duration: 0,
            fps: 0.0,
            video_resolution: PLACEHOLDER_RESOLUTION.to_string(),
            status: VideoStatus::Processing,
            uploaded_at,
        }
    }
}

/// Check a title against the length rules.
pub fn validate_title(title: &str) -> ValidationResult<()> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    let len = title.chars().count();
    if len > MAX_TITLE_LEN {
        return Err(ValidationError::TitleTooLong(len));
    }
    Ok(())
}

/// Partial update of a video record. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_key: Option<ObjectKey>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_resolution: Option<String>,
    /// Set `preview_key` to absent. Ignored when `preview_key` is supplied.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub clear_preview: bool,
}

impl VideoPatch {
    /// Terminal success update carrying extracted metadata and the preview key.
    pub fn ready(metadata: &ExtractedMetadata, preview_key: ObjectKey) -> Self {
        Self {
            status: Some(VideoStatus::Ready),
            preview_key: Some(preview_key),
            duration: Some(metadata.duration_whole_secs()),
            fps: Some(metadata.fps),
            video_resolution: Some(metadata.video_resolution.clone()),
            ..Default::default()
        }
    }

    /// Terminal failure update. Only touches the status.
    pub fn failed() -> Self {
        Self {
            status: Some(VideoStatus::Failed),
            ..Default::default()
        }
    }

    /// Back to the placeholder state for a rerun: `processing`, no preview,
    /// zeroed metadata.
    pub fn reset() -> Self {
        Self {
            status: Some(VideoStatus::Processing),
            duration: Some(0),
            fps: Some(0.0),
            video_resolution: Some(PLACEHOLDER_RESOLUTION.to_string()),
            clear_preview: true,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply the supplied fields to a record in place.
    pub fn apply_to(&self, record: &mut VideoRecord) {
        if let Some(title) = &self.title {
            record.title = title.clone();
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(preview_key) = &self.preview_key {
            record.preview_key = Some(preview_key.clone());
        } else if self.clear_preview {
            record.preview_key = None;
        }
        if let Some(duration) = self.duration {
            record.duration = duration;
        }
        if let Some(fps) = self.fps {
            record.fps = fps;
        }
        if let Some(resolution) = &self.video_resolution {
            record.video_resolution = resolution.clone();
        }
    }
}
