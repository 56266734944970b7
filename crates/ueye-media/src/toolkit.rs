//! Media capability seam used by the post-processing task.

use std::path::PathBuf;

use async_trait::async_trait;

use ueye_models::ExtractedMetadata;

use crate::error::MediaResult;
use crate::{preview, probe};

/// Metadata extraction and preview generation over raw video bytes.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// See [`probe::extract_metadata`].
    async fn extract_metadata(&self, bytes: &[u8]) -> MediaResult<ExtractedMetadata>;

    /// See [`preview::generate_preview`].
    async fn generate_preview(&self, bytes: &[u8]) -> MediaResult<Vec<u8>>;
}

/// [`MediaToolkit`] backed by the ffprobe/ffmpeg binaries.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit {
    scratch_dir: Option<PathBuf>,
}

impl FfmpegToolkit {
    /// Use the system temp directory for scratch files.
    pub fn new() -> Self {
        Self { scratch_dir: None }
    }

    /// Place scratch files under `dir`.
    pub fn with_scratch_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            scratch_dir: Some(dir.into()),
        }
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn extract_metadata(&self, bytes: &[u8]) -> MediaResult<ExtractedMetadata> {
        probe::extract_metadata(bytes, self.scratch_dir.as_deref()).await
    }

    async fn generate_preview(&self, bytes: &[u8]) -> MediaResult<Vec<u8>> {
        preview::generate_preview(bytes, self.scratch_dir.as_deref()).await
    }
}
