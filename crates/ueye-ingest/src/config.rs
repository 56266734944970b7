//! Ingest configuration.

/// Upload limits and the target bucket.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Bucket holding raw videos
    pub bucket: String,
    /// Largest accepted upload in bytes
    pub max_upload_bytes: u64,
    /// Accepted filename extensions, lowercase without the dot
    pub allowed_extensions: Vec<String>,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            bucket: "urban-eye".to_string(),
            max_upload_bytes: 1024 * 1024 * 1024, // 1 GiB
            allowed_extensions: vec!["mp4".to_string()],
        }
    }
}

impl IngestConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            bucket: std::env::var("S3_BUCKET").unwrap_or(defaults.bucket),
            max_upload_bytes: std::env::var("UPLOAD_MAX_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_upload_bytes),
            allowed_extensions: std::env::var("UPLOAD_ALLOWED_EXTENSIONS")
                .ok()
                .map(|s| parse_extensions(&s))
                .filter(|exts| !exts.is_empty())
                .unwrap_or(defaults.allowed_extensions),
        }
    }

    pub fn allows_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|allowed| *allowed == ext)
    }
}

fn parse_extensions(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
