//! Record store tests against a running PostgreSQL instance.

use chrono::Utc;
use ueye_db::{DatabaseConfig, PgVideoStore, VideoStore};
use ueye_models::{
    CameraId, ExtractedMetadata, KeyPurpose, NewVideo, ObjectKey, TimeOfDay, UserId, VideoId,
    VideoPatch, VideoStatus,
};
use uuid::Uuid;

async fn store() -> PgVideoStore {
    dotenvy::dotenv().ok();
    let config = DatabaseConfig::from_env().expect("DATABASE_URL must be set");
    PgVideoStore::connect(&config)
        .await
        .expect("Failed to connect to PostgreSQL")
}

fn new_video() -> NewVideo {
    NewVideo {
        title: "Intersection north".to_string(),
        time_of_day: TimeOfDay::Night,
        camera_id: CameraId(Uuid::new_v4()),
        uploader_id: UserId(1),
        video_key: ObjectKey::generate(KeyPurpose::Video),
    }
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_create_then_get() {
    let store = store().await;
    let created = store.create(new_video()).await.expect("Failed to create");

    assert_eq!(created.status, VideoStatus::Processing);
    assert!(created.is_placeholder());

    let fetched = store.get(created.id).await.unwrap().expect("Record missing");
    assert_eq!(fetched.video_key, created.video_key);
    assert!(store.exists_with_video_key(&created.video_key).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_ready_update_keeps_untouched_fields() {
    let store = store().await;
    let created = store.create(new_video()).await.unwrap();
    let meta = ExtractedMetadata::new(25.0, 250, 1280, 720);
    let preview = ObjectKey::generate(KeyPurpose::Preview);

    let updated = store
        .update(created.id, VideoPatch::ready(&meta, preview.clone()))
        .await
        .unwrap()
        .expect("Record missing");

    assert_eq!(updated.status, VideoStatus::Ready);
    assert_eq!(updated.preview_key, Some(preview));
    assert_eq!(updated.duration, 10);
    assert_eq!(updated.fps, 25.0);
    assert_eq!(updated.video_resolution, "1280x720");
    assert_eq!(updated.title, created.title);
    assert_eq!(updated.uploaded_at, created.uploaded_at);
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_failed_update_touches_status_only() {
    let store = store().await;
    let created = store.create(new_video()).await.unwrap();

    let updated = store
        .update(created.id, VideoPatch::failed())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(updated.status, VideoStatus::Failed);
    assert!(updated.preview_key.is_none());
    assert_eq!(updated.video_resolution, "0x0");
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_reset_clears_preview_and_metadata() {
    let store = store().await;
    let created = store.create(new_video()).await.unwrap();
    let meta = ExtractedMetadata::new(25.0, 250, 1280, 720);
    let preview = ObjectKey::generate(KeyPurpose::Preview);
    store
        .update(created.id, VideoPatch::ready(&meta, preview.clone()))
        .await
        .unwrap();
    assert!(store.exists_with_preview_key(&preview).await.unwrap());

    let reset = store
        .update(created.id, VideoPatch::reset())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(reset.status, VideoStatus::Processing);
    assert!(reset.is_placeholder());
    assert!(!store.exists_with_preview_key(&preview).await.unwrap());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_update_unknown_id_is_none() {
    let store = store().await;
    let result = store
        .update(VideoId(i64::MAX), VideoPatch::failed())
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
#[ignore = "requires PostgreSQL"]
async fn test_list_by_status_respects_cutoff() {
    let store = store().await;
    let created = store.create(new_video()).await.unwrap();

    let listed = store
        .list_by_status(VideoStatus::Processing, Utc::now(), 1000)
        .await
        .unwrap();
    assert!(listed.iter().any(|r| r.id == created.id));

    let none = store
        .list_by_status(VideoStatus::Processing, created.uploaded_at, 1000)
        .await
        .unwrap();
    assert!(none.iter().all(|r| r.id != created.id));
}
