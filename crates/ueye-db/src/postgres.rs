//! PostgreSQL-backed [`VideoStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info, instrument};
use ueye_models::{
    validate_title, CameraId, NewVideo, ObjectKey, TimeOfDay, UserId, VideoId, VideoPatch,
    VideoRecord, VideoStatus, PLACEHOLDER_RESOLUTION,
};
use uuid::Uuid;

use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::store::VideoStore;

const RECORD_COLUMNS: &str = "id, title, time_of_day, camera_id, uploader_id, video_key, \
     preview_key, duration, fps, video_resolution, status, uploaded_at";

/// Raw `videos` row as stored.
#[derive(Debug, FromRow)]
struct VideoRow {
    id: i64,
    title: String,
    time_of_day: String,
    camera_id: Uuid,
    uploader_id: i64,
    video_key: String,
    preview_key: Option<String>,
    duration: i32,
    fps: f64,
    video_resolution: String,
    status: String,
    uploaded_at: DateTime<Utc>,
}

impl TryFrom<VideoRow> for VideoRecord {
    type Error = DbError;

    fn try_from(row: VideoRow) -> DbResult<Self> {
        let id = row.id;
        let time_of_day: TimeOfDay = row
            .time_of_day
            .parse()
            .map_err(|e| DbError::corrupt_row(id, format!("{}", e)))?;
        let status: VideoStatus = row
            .status
            .parse()
            .map_err(|e: String| DbError::corrupt_row(id, e))?;
        let video_key =
            ObjectKey::parse(row.video_key).map_err(|e| DbError::corrupt_row(id, e.to_string()))?;
        // Older rows store an empty string instead of NULL.
        let preview_key = match row.preview_key.filter(|k| !k.is_empty()) {
            Some(k) => {
                Some(ObjectKey::parse(k).map_err(|e| DbError::corrupt_row(id, e.to_string()))?)
            }
            None => None,
        };

        Ok(VideoRecord {
            id: VideoId(id),
            title: row.title,
            time_of_day,
            camera_id: CameraId(row.camera_id),
            uploader_id: UserId(row.uploader_id),
            video_key,
            preview_key,
            duration: row.duration,
            fps: row.fps,
            video_resolution: row.video_resolution,
            status,
            uploaded_at: row.uploaded_at,
        })
    }
}

/// Video records in PostgreSQL. Each call checks a connection out of the pool.
#[derive(Clone)]
pub struct PgVideoStore {
    pool: PgPool,
}

impl PgVideoStore {
    /// Connect and, if configured, apply the embedded migrations.
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.url)
            .await?;

        info!(max_connections = config.max_connections, "Connected to PostgreSQL");

        let store = Self { pool };
        if config.run_migrations {
            store.run_migrations().await?;
        }
        Ok(store)
    }

    /// Create from environment variables.
    pub async fn from_env() -> DbResult<Self> {
        let config = DatabaseConfig::from_env()?;
        Self::connect(&config).await
    }

    pub async fn run_migrations(&self) -> DbResult<()> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        info!("Database migrations completed");
        Ok(())
    }

    /// Cheap liveness check.
    pub async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl VideoStore for PgVideoStore {
    #[instrument(skip(self, new), fields(video_key = %new.video_key))]
    async fn create(&self, new: NewVideo) -> DbResult<VideoRecord> {
        new.validate()?;

        let sql = format!(
            "INSERT INTO videos (title, time_of_day, camera_id, uploader_id, video_key, \
             preview_key, duration, fps, video_resolution, status) \
             VALUES ($1, $2, $3, $4, $5, NULL, 0, 0, $6, $7) \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let row: VideoRow = sqlx::query_as(&sql)
            .bind(&new.title)
            .bind(new.time_of_day.as_str())
            .bind(new.camera_id.0)
            .bind(new.uploader_id.0)
            .bind(new.video_key.as_str())
            .bind(PLACEHOLDER_RESOLUTION)
            .bind(VideoStatus::Processing.as_str())
            .fetch_one(&self.pool)
            .await?;

        let record = VideoRecord::try_from(row)?;
        debug!(video_id = %record.id, "Created placeholder video record");
        Ok(record)
    }

    async fn get(&self, id: VideoId) -> DbResult<Option<VideoRecord>> {
        let sql = format!("SELECT {} FROM videos WHERE id = $1", RECORD_COLUMNS);
        let row: Option<VideoRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?;

        row.map(VideoRecord::try_from).transpose()
    }

    #[instrument(skip(self, patch), fields(video_id = %id))]
    async fn update(&self, id: VideoId, patch: VideoPatch) -> DbResult<Option<VideoRecord>> {
        if patch.is_empty() {
            return self.get(id).await;
        }
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }

        let sql = format!(
            "UPDATE videos SET \
             title = COALESCE($2, title), \
             status = COALESCE($3, status), \
             preview_key = COALESCE($4, CASE WHEN $8 THEN NULL ELSE preview_key END), \
             duration = COALESCE($5, duration), \
             fps = COALESCE($6, fps), \
             video_resolution = COALESCE($7, video_resolution) \
             WHERE id = $1 \
             RETURNING {}",
            RECORD_COLUMNS
        );
        let row: Option<VideoRow> = sqlx::query_as(&sql)
            .bind(id.0)
            .bind(patch.title.as_deref())
            .bind(patch.status.map(|s| s.as_str()))
            .bind(patch.preview_key.as_ref().map(|k| k.as_str()))
            .bind(patch.duration)
            .bind(patch.fps)
            .bind(patch.video_resolution.as_deref())
            .bind(patch.clear_preview)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let record = VideoRecord::try_from(row)?;
                debug!(status = %record.status, "Updated video record");
                Ok(Some(record))
            }
            None => {
                debug!("Update skipped, video record not found");
                Ok(None)
            }
        }
    }

    async fn exists_with_video_key(&self, key: &ObjectKey) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM videos WHERE video_key = $1)")
                .bind(key.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn exists_with_preview_key(&self, key: &ObjectKey) -> DbResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM videos WHERE preview_key = $1)")
                .bind(key.as_str())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn list_by_status(
        &self,
        status: VideoStatus,
        before: DateTime<Utc>,
        limit: u32,
    ) -> DbResult<Vec<VideoRecord>> {
        let sql = format!(
            "SELECT {} FROM videos WHERE status = $1 AND uploaded_at < $2 \
             ORDER BY uploaded_at ASC LIMIT $3",
            RECORD_COLUMNS
        );
        let rows: Vec<VideoRow> = sqlx::query_as(&sql)
            .bind(status.as_str())
            .bind(before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(VideoRecord::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> VideoRow {
        VideoRow {
            id: 7,
            title: "Crossing".to_string(),
            time_of_day: "evening".to_string(),
            camera_id: Uuid::nil(),
            uploader_id: 3,
            video_key: "videos/abc.mp4".to_string(),
            preview_key: Some(String::new()),
            duration: 0,
            fps: 0.0,
            video_resolution: "0x0".to_string(),
            status: "processing".to_string(),
            uploaded_at: Utc::now(),
        }
    }

    #[test]
    fn test_row_conversion_treats_empty_preview_as_absent() {
        let record = VideoRecord::try_from(row()).unwrap();
        assert_eq!(record.id, VideoId(7));
        assert_eq!(record.time_of_day, TimeOfDay::Evening);
        assert_eq!(record.preview_key, None);
        assert!(record.is_placeholder());
    }

    #[test]
    fn test_row_conversion_rejects_unknown_status() {
        let mut bad = row();
        bad.status = "archived".to_string();
        let err = VideoRecord::try_from(bad).unwrap_err();
        assert!(matches!(err, DbError::CorruptRow { id: 7, .. }));
    }

    #[test]
    fn test_row_conversion_parses_preview_key() {
        let mut ready = row();
        ready.status = "ready".to_string();
        ready.preview_key = Some("previews/abc.jpg".to_string());
        let record = VideoRecord::try_from(ready).unwrap();
        assert_eq!(record.preview_key.unwrap().as_str(), "previews/abc.jpg");
        assert_eq!(record.status, VideoStatus::Ready);
    }
}
