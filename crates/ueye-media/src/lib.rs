//! FFmpeg/FFprobe wrappers for the video pipeline.
//!
//! This crate provides:
//! - Metadata extraction (frame rate, frame count, dimensions, duration)
//! - First-frame preview generation (JPEG)
//! - Scoped scratch files that are removed on every exit path
//! - The [`MediaToolkit`] seam used by the worker

pub mod command;
pub mod error;
pub mod preview;
pub mod probe;
pub mod scratch;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use preview::generate_preview;
pub use probe::{extract_metadata, parse_probe_output};
pub use scratch::ScratchFile;
pub use toolkit::{FfmpegToolkit, MediaToolkit};
