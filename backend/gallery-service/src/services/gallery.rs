//! Gallery operations: upload and delete validators, counter refresh.

use crate::config::QuotaDefaults;
use crate::error::{AppError, Result};
use crate::models::{
    GalleryAggregate, VideoMetadata, VideoRecord, GALLERY_NOT_FOUND_MSG, VIDEO_NOT_FOUND_MSG,
};
use crate::storage::{is_allowed_video, object_key, ObjectStorage, ALLOWED_EXTENSIONS};
use chrono::Utc;
use document_store::{modify, DocumentCollection, StoreError};
use quota_events::{Destination, QuotaEvent, StorageUpdated, UsageUpdated, VideoAdded, VideoRemoved};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use transactional_outbox::EventPropagator;
use uuid::Uuid;

/// An uploaded file already streamed to local disk.
#[derive(Debug, Clone)]
pub struct UploadedFile<'a> {
    pub filename: &'a str,
    pub local_path: &'a Path,
    pub size: u64,
}

#[derive(Clone)]
pub struct GalleryService {
    galleries: Arc<dyn DocumentCollection<GalleryAggregate>>,
    storage: Arc<dyn ObjectStorage>,
    propagator: EventPropagator,
    defaults: QuotaDefaults,
}

impl GalleryService {
    pub fn new(
        galleries: Arc<dyn DocumentCollection<GalleryAggregate>>,
        storage: Arc<dyn ObjectStorage>,
        propagator: EventPropagator,
        defaults: QuotaDefaults,
    ) -> Self {
        Self {
            galleries,
            storage,
            propagator,
            defaults,
        }
    }

    /// Largest body a single upload may spool before it is refused.
    pub fn max_upload_bytes(&self) -> u64 {
        self.defaults.free_storage
    }

    /// Create the user's gallery with default counters. Returns false if it already exists.
    pub async fn create_gallery(&self, user_id: &str) -> Result<bool> {
        let gallery = GalleryAggregate::new(
            user_id,
            self.defaults.free_storage,
            self.defaults.free_bandwidth,
        );
        match self.galleries.insert(gallery).await {
            Ok(_) => {
                info!(user_id = %user_id, "Gallery created");
                Ok(true)
            }
            Err(StoreError::AlreadyExists { .. }) => {
                debug!(user_id = %user_id, "Gallery already exists");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_gallery(&self, user_id: &str) -> Result<GalleryAggregate> {
        self.galleries
            .get(user_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(GALLERY_NOT_FOUND_MSG.to_string()))
    }

    pub async fn get_video(&self, user_id: &str, video_id: &str) -> Result<VideoRecord> {
        let gallery = self.get_gallery(user_id).await?;
        gallery
            .find_video(video_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(VIDEO_NOT_FOUND_MSG.to_string()))
    }

    /// Admit, store and record one video.
    ///
    /// The quota check and the reservation are one optimistic read-validate-write, so
    /// concurrent uploads cannot both pass against the same free space. Later failures
    /// undo what was done before them. A rejected upload changes nothing and emits nothing.
    pub async fn upload_video(
        &self,
        user_id: &str,
        file: UploadedFile<'_>,
        metadata: VideoMetadata,
    ) -> Result<(VideoRecord, GalleryAggregate)> {
        if !is_allowed_video(file.filename) {
            return Err(AppError::BadRequest(format!(
                "Invalid file type. Allowed types: {}",
                ALLOWED_EXTENSIONS.join(", ")
            )));
        }

        let size = file.size;
        let reserved = modify(&*self.galleries, user_id, |gallery| {
            gallery.reserve(size).map_err(AppError::from)
        })
        .await?;
        if reserved.is_none() {
            return Err(AppError::NotFound(GALLERY_NOT_FOUND_MSG.to_string()));
        }

        let key = object_key(file.filename);
        let url = match self.storage.upload(file.local_path, &key).await {
            Ok(url) => url,
            Err(e) => {
                self.release_reservation(user_id, size).await;
                return Err(e.into());
            }
        };

        let record = VideoRecord {
            id: Uuid::new_v4().to_string(),
            title: metadata
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or_else(|| file.filename.to_string()),
            size,
            url,
            storage_key: key.clone(),
            description: metadata.description,
            thumbnail: metadata.thumbnail,
            duration: metadata.duration,
            event_id: metadata.event_id,
            created_at: Utc::now(),
        };

        let appended = modify(&*self.galleries, user_id, |gallery| {
            gallery.commit_video(record.clone());
            Ok::<_, AppError>(())
        })
        .await;

        let gallery = match appended {
            Ok(Some((stored, ()))) => stored.doc,
            failed => {
                if let Err(e) = self.storage.delete(&key).await {
                    warn!(key = %key, error = %e, "Failed to remove orphaned object");
                }
                self.release_reservation(user_id, size).await;
                return Err(match failed {
                    Err(e) => e,
                    _ => AppError::NotFound(GALLERY_NOT_FOUND_MSG.to_string()),
                });
            }
        };

        let event = QuotaEvent::VideoAdded(VideoAdded {
            user_id: user_id.to_string(),
            video: record.summary(),
            gallery_event_id: record.event_id.clone(),
        });
        self.propagator
            .emit_logged(&Destination::quota_trackers(), &event)
            .await;

        crate::metrics::record_upload(size);
        info!(
            user_id = %user_id,
            video_id = %record.id,
            size = size,
            free_storage = gallery.free_storage,
            free_bandwidth = gallery.free_bandwidth,
            "Video uploaded"
        );
        Ok((record, gallery))
    }

    /// Remove a video, giving its size back to storage. Bandwidth is not restored.
    pub async fn delete_video(&self, user_id: &str, video_id: &str) -> Result<GalleryAggregate> {
        let video = self.get_video(user_id, video_id).await?;

        if let Err(e) = self.storage.delete(&video.storage_key).await {
            warn!(
                user_id = %user_id,
                key = %video.storage_key,
                error = %e,
                "Failed to delete object, removing record anyway"
            );
        }

        let (stored, removed) = modify(&*self.galleries, user_id, |gallery| {
            gallery
                .remove_video(video_id)
                .ok_or_else(|| AppError::NotFound(VIDEO_NOT_FOUND_MSG.to_string()))
        })
        .await?
        .ok_or_else(|| AppError::NotFound(GALLERY_NOT_FOUND_MSG.to_string()))?;

        let event = QuotaEvent::VideoRemoved(VideoRemoved {
            user_id: user_id.to_string(),
            video_id: removed.id.clone(),
            video_size: removed.size,
            gallery_event_id: removed.event_id.clone(),
        });
        self.propagator
            .emit_logged(&Destination::quota_trackers(), &event)
            .await;

        crate::metrics::record_delete(removed.size);
        info!(
            user_id = %user_id,
            video_id = %removed.id,
            free_storage = stored.doc.free_storage,
            "Video deleted"
        );
        Ok(stored.doc)
    }

    /// Overwrite the cached free storage. Returns false for an unknown gallery or a stale update.
    pub async fn apply_storage_update(&self, update: &StorageUpdated) -> Result<bool> {
        let applied = modify(&*self.galleries, &update.user_id, |gallery| {
            Ok::<_, AppError>(gallery.apply_storage_update(update))
        })
        .await?;
        Ok(self.log_refresh(&update.user_id, "storage", update.version, applied))
    }

    /// Overwrite the cached free bandwidth. Returns false for an unknown gallery or a stale update.
    pub async fn apply_usage_update(&self, update: &UsageUpdated) -> Result<bool> {
        let applied = modify(&*self.galleries, &update.user_id, |gallery| {
            Ok::<_, AppError>(gallery.apply_usage_update(update))
        })
        .await?;
        Ok(self.log_refresh(&update.user_id, "usage", update.version, applied))
    }

    fn log_refresh<T>(
        &self,
        user_id: &str,
        counter: &str,
        version: u64,
        outcome: Option<(T, bool)>,
    ) -> bool {
        match outcome {
            Some((_, true)) => {
                debug!(user_id = %user_id, counter, version, "Gallery counters refreshed");
                true
            }
            Some((_, false)) => {
                debug!(user_id = %user_id, counter, version, "Stale counter update ignored");
                false
            }
            None => {
                warn!(user_id = %user_id, counter, "Counter update for unknown gallery");
                false
            }
        }
    }

    async fn release_reservation(&self, user_id: &str, size: u64) {
        let released = modify(&*self.galleries, user_id, |gallery| {
            gallery.release(size);
            Ok::<_, AppError>(())
        })
        .await;
        if let Err(e) = released {
            warn!(user_id = %user_id, size, error = %e, "Failed to release reservation");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryObjectStorage;
    use document_store::MemoryCollection;
    use quota_events::{event_types, MIB};
    use transactional_outbox::InMemoryOutboxRepository;

    struct Fixture {
        service: GalleryService,
        galleries: Arc<MemoryCollection<GalleryAggregate>>,
        storage: Arc<InMemoryObjectStorage>,
        outbox: Arc<InMemoryOutboxRepository>,
        path: std::path::PathBuf,
    }

    impl Fixture {
        async fn new() -> Self {
            let galleries: Arc<MemoryCollection<GalleryAggregate>> =
                Arc::new(MemoryCollection::new());
            let storage = Arc::new(InMemoryObjectStorage::new());
            let outbox = Arc::new(InMemoryOutboxRepository::new());
            let service = GalleryService::new(
                galleries.clone(),
                storage.clone(),
                EventPropagator::new(outbox.clone(), "gallery-service"),
                QuotaDefaults::default(),
            );
            let path = std::env::temp_dir().join(format!("inkwell-gallery-{}", Uuid::new_v4()));
            tokio::fs::write(&path, b"not really a video").await.unwrap();
            Self {
                service,
                galleries,
                storage,
                outbox,
                path,
            }
        }

        fn file<'a>(&'a self, filename: &'a str, size: u64) -> UploadedFile<'a> {
            UploadedFile {
                filename,
                local_path: &self.path,
                size,
            }
        }

        async fn gallery(&self) -> GalleryAggregate {
            self.galleries.get("user-1").await.unwrap().unwrap().doc
        }
    }

    #[tokio::test]
    async fn test_create_gallery_is_idempotent() {
        let fx = Fixture::new().await;
        assert!(fx.service.create_gallery("user-1").await.unwrap());
        assert!(!fx.service.create_gallery("user-1").await.unwrap());
        assert_eq!(fx.galleries.len(), 1);

        let gallery = fx.gallery().await;
        assert_eq!(gallery.free_storage, 50 * MIB);
        assert_eq!(gallery.free_bandwidth, 100 * MIB);
    }

    #[tokio::test]
    async fn test_upload_decrements_counters_and_emits() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();

        let (video, gallery) = fx
            .service
            .upload_video("user-1", fx.file("clip.MP4", 10 * MIB), VideoMetadata::default())
            .await
            .unwrap();

        assert_eq!(gallery.videos.len(), 1);
        assert_eq!(gallery.free_storage, 40 * MIB);
        assert_eq!(gallery.free_bandwidth, 90 * MIB);
        assert_eq!(video.title, "clip.MP4");
        assert!(fx.storage.contains(&video.storage_key));

        let records = fx.outbox.all();
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.event_type == event_types::VIDEO_ADDED));
        assert_eq!(records[0].payload["video"]["size"], 10 * MIB);
    }

    #[tokio::test]
    async fn test_event_gallery_upload_uses_event_type() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();

        let metadata = VideoMetadata {
            event_id: Some("evt-42".into()),
            ..Default::default()
        };
        fx.service
            .upload_video("user-1", fx.file("clip.webm", MIB), metadata)
            .await
            .unwrap();

        let records = fx.outbox.all();
        assert!(records
            .iter()
            .all(|r| r.event_type == event_types::EVENT_VIDEO_ADDED));
        assert_eq!(records[0].payload["eventId"], "evt-42");
    }

    #[tokio::test]
    async fn test_rejections_mutate_nothing() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();
        let before = fx.gallery().await;

        let err = fx
            .service
            .upload_video("user-1", fx.file("big.mp4", 51 * MIB), VideoMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(ref m) if m == "Insufficient storage space"));

        let err = fx
            .service
            .upload_video("user-1", fx.file("notes.txt", MIB), VideoMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let err = fx
            .service
            .upload_video("nobody", fx.file("clip.mp4", MIB), VideoMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Gallery not found"));

        assert_eq!(fx.gallery().await, before);
        assert!(fx.outbox.all().is_empty());
        assert!(fx.storage.is_empty());
    }

    #[tokio::test]
    async fn test_bandwidth_rejection() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();
        modify(&*fx.service.galleries, "user-1", |g| {
            g.free_bandwidth = MIB;
            Ok::<_, AppError>(())
        })
        .await
        .unwrap();

        let err = fx
            .service
            .upload_video("user-1", fx.file("clip.mp4", 2 * MIB), VideoMetadata::default())
            .await
            .unwrap_err();
        assert!(
            matches!(err, AppError::BadRequest(ref m) if m == "Video exceeds daily bandwidth limit")
        );
    }

    #[tokio::test]
    async fn test_storage_failure_releases_reservation() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();
        fx.storage.set_unavailable(true);

        let err = fx
            .service
            .upload_video("user-1", fx.file("clip.mp4", 10 * MIB), VideoMetadata::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::StorageError(_)));

        let gallery = fx.gallery().await;
        assert_eq!(gallery.free_storage, 50 * MIB);
        assert_eq!(gallery.free_bandwidth, 100 * MIB);
        assert!(gallery.videos.is_empty());
        assert!(fx.outbox.all().is_empty());
    }

    #[tokio::test]
    async fn test_delete_restores_storage_not_bandwidth() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();
        let (video, _) = fx
            .service
            .upload_video("user-1", fx.file("clip.mp4", 10 * MIB), VideoMetadata::default())
            .await
            .unwrap();

        let gallery = fx.service.delete_video("user-1", &video.id).await.unwrap();
        assert!(gallery.videos.is_empty());
        assert_eq!(gallery.free_storage, 50 * MIB);
        assert_eq!(gallery.free_bandwidth, 90 * MIB);
        assert!(!fx.storage.contains(&video.storage_key));

        let removed: Vec<_> = fx
            .outbox
            .all()
            .into_iter()
            .filter(|r| r.event_type == event_types::VIDEO_REMOVED)
            .collect();
        assert_eq!(removed.len(), 3);
        assert_eq!(removed[0].payload["videoSize"], 10 * MIB);
    }

    #[tokio::test]
    async fn test_delete_survives_storage_outage() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();
        let (video, _) = fx
            .service
            .upload_video("user-1", fx.file("clip.mp4", MIB), VideoMetadata::default())
            .await
            .unwrap();

        fx.storage.set_unavailable(true);
        let gallery = fx.service.delete_video("user-1", &video.id).await.unwrap();
        assert!(gallery.videos.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_video() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();

        let err = fx.service.delete_video("user-1", "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Video not found"));
        let err = fx.service.delete_video("nobody", "missing").await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Gallery not found"));
    }

    #[tokio::test]
    async fn test_concurrent_uploads_cannot_overdraw() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();

        let uploads = (0..6).map(|_| {
            fx.service
                .upload_video("user-1", fx.file("clip.mp4", 10 * MIB), VideoMetadata::default())
        });
        let results = futures::future::join_all(uploads).await;

        let accepted = results.iter().filter(|r| r.is_ok()).count();
        assert_eq!(accepted, 5);
        let gallery = fx.gallery().await;
        assert_eq!(gallery.free_storage, 0);
        assert_eq!(gallery.videos.len(), 5);
    }

    #[tokio::test]
    async fn test_storage_update_ignores_stale_versions() {
        let fx = Fixture::new().await;
        fx.service.create_gallery("user-1").await.unwrap();

        let update = |free, version| StorageUpdated {
            user_id: "user-1".into(),
            total_storage: 50 * MIB,
            used_storage: 50 * MIB - free,
            free_storage: free,
            version,
        };

        assert!(fx.service.apply_storage_update(&update(40 * MIB, 2)).await.unwrap());
        assert!(!fx.service.apply_storage_update(&update(50 * MIB, 1)).await.unwrap());
        assert_eq!(fx.gallery().await.free_storage, 40 * MIB);

        let mut unknown = update(1, 9);
        unknown.user_id = "nobody".into();
        assert!(!fx.service.apply_storage_update(&unknown).await.unwrap());
    }
}
