//! Scoped scratch files for decoder input.
//!
//! FFmpeg needs a seekable file, so raw bytes are persisted to a temporary
//! file that is exclusively owned by one extraction call. The file is deleted
//! when the [`ScratchFile`] is dropped, which covers early returns and errors.

use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::MediaResult;

/// Temporary on-disk copy of a video payload.
#[derive(Debug)]
pub struct ScratchFile {
    file: NamedTempFile,
}

impl ScratchFile {
    /// Persist `bytes` into a new scratch file under `dir` (system temp dir if `None`).
    pub async fn write(dir: Option<&Path>, bytes: &[u8]) -> MediaResult<Self> {
        let dir = dir.map(Path::to_path_buf);
        let data = bytes.to_vec();

        let file = tokio::task::spawn_blocking(move || -> std::io::Result<NamedTempFile> {
            use std::io::Write;

            let mut builder = tempfile::Builder::new();
            builder.prefix("ueye-").suffix(".mp4");
            let mut file = match dir {
                Some(dir) => {
                    std::fs::create_dir_all(&dir)?;
                    builder.tempfile_in(dir)?
                }
                None => builder.tempfile()?,
            };
            file.write_all(&data)?;
            file.flush()?;
            Ok(file)
        })
        .await
        .map_err(std::io::Error::other)??;

        debug!("Wrote {} bytes to scratch file {}", bytes.len(), file.path().display());
        Ok(Self { file })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Remove the file now, surfacing any deletion error.
    pub fn close(self) -> MediaResult<()> {
        self.file.close()?;
        Ok(())
    }
}
