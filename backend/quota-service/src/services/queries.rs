//! Query view maintenance and event gallery counters.

use crate::config::QuotaLimits;
use crate::error::{AppError, Result};
use crate::models::{EventGalleryStats, QueryAggregate, EVENT_GALLERY_NOT_FOUND_MSG, QUERY_NOT_FOUND_MSG};
use document_store::{modify, DocumentCollection};
use quota_events::{StorageUpdated, UsageUpdated, UserCreated, VideoSummary};
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct QueryService {
    queries: Arc<dyn DocumentCollection<QueryAggregate>>,
    limits: QuotaLimits,
}

impl QueryService {
    pub fn new(queries: Arc<dyn DocumentCollection<QueryAggregate>>, limits: QuotaLimits) -> Self {
        Self { queries, limits }
    }

    pub async fn get(&self, user_id: &str) -> Result<QueryAggregate> {
        self.queries
            .get(user_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(QUERY_NOT_FOUND_MSG.to_string()))
    }

    /// Create the view for a new user. A view opened earlier by an out-of-order video
    /// event gets the profile fields filled in.
    pub async fn create_user(&self, created: &UserCreated) -> Result<bool> {
        let view = QueryAggregate::new(
            &created.user_id,
            &created.username,
            &created.email,
            self.limits.total_storage,
            self.limits.daily_limit,
        );
        if self.queries.insert_if_absent(view).await? {
            info!(user_id = %created.user_id, "Query view created");
            return Ok(true);
        }

        modify(&*self.queries, &created.user_id, |view| {
            if view.username.is_empty() {
                view.username = created.username.clone();
            }
            if view.email.is_empty() {
                view.email = created.email.clone();
            }
            Ok::<_, AppError>(())
        })
        .await?;
        debug!(user_id = %created.user_id, "Query view already exists");
        Ok(false)
    }

    pub async fn add_video(&self, user_id: &str, video: &VideoSummary) -> Result<bool> {
        self.update(user_id, |view| view.add_video(video.clone())).await
    }

    pub async fn remove_video(&self, user_id: &str, video_id: &str) -> Result<bool> {
        self.update(user_id, |view| view.remove_video(video_id)).await
    }

    pub async fn apply_storage_update(&self, update: &StorageUpdated) -> Result<bool> {
        let applied = self
            .update(&update.user_id, |view| view.apply_storage_update(update))
            .await?;
        if !applied {
            debug!(user_id = %update.user_id, version = update.version, "Stale storage update ignored");
        }
        Ok(applied)
    }

    pub async fn apply_usage_update(&self, update: &UsageUpdated) -> Result<bool> {
        let applied = self
            .update(&update.user_id, |view| view.apply_usage_update(update))
            .await?;
        if !applied {
            debug!(user_id = %update.user_id, version = update.version, "Stale usage update ignored");
        }
        Ok(applied)
    }

    /// Read-modify-write the view, opening an empty one first if the user is not known yet.
    async fn update<F>(&self, user_id: &str, mut f: F) -> Result<bool>
    where
        F: FnMut(&mut QueryAggregate) -> bool,
    {
        if let Some((_, changed)) =
            modify(&*self.queries, user_id, |view| Ok::<_, AppError>(f(view))).await?
        {
            return Ok(changed);
        }

        debug!(user_id = %user_id, "Opening query view ahead of UserCreated");
        let placeholder = QueryAggregate::new(
            user_id,
            "",
            "",
            self.limits.total_storage,
            self.limits.daily_limit,
        );
        self.queries.insert_if_absent(placeholder).await?;
        let changed = modify(&*self.queries, user_id, |view| Ok::<_, AppError>(f(view)))
            .await?
            .map(|(_, changed)| changed)
            .unwrap_or(false);
        Ok(changed)
    }
}

/// Per social event video counters.
#[derive(Clone)]
pub struct EventGalleryService {
    stats: Arc<dyn DocumentCollection<EventGalleryStats>>,
}

impl EventGalleryService {
    pub fn new(stats: Arc<dyn DocumentCollection<EventGalleryStats>>) -> Self {
        Self { stats }
    }

    pub async fn get(&self, event_id: &str) -> Result<EventGalleryStats> {
        self.stats
            .get(event_id)
            .await?
            .map(|stored| stored.doc)
            .ok_or_else(|| AppError::NotFound(EVENT_GALLERY_NOT_FOUND_MSG.to_string()))
    }

    /// Add `delta` to the event's video count, floored at zero.
    pub async fn adjust(&self, event_id: &str, delta: i64) -> Result<u64> {
        let adjust = |stats: &mut EventGalleryStats| {
            stats.adjust(delta);
            Ok::<_, AppError>(stats.total_videos)
        };

        if let Some((_, total)) = modify(&*self.stats, event_id, adjust).await? {
            debug!(event_id = %event_id, delta, total, "Event gallery adjusted");
            return Ok(total);
        }

        self.stats
            .insert_if_absent(EventGalleryStats::new(event_id))
            .await?;
        let total = modify(&*self.stats, event_id, adjust)
            .await?
            .map(|(_, total)| total)
            .unwrap_or(0);
        debug!(event_id = %event_id, delta, total, "Event gallery opened");
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use document_store::MemoryCollection;
    use quota_events::MIB;

    fn queries() -> (QueryService, Arc<MemoryCollection<QueryAggregate>>) {
        let store: Arc<MemoryCollection<QueryAggregate>> = Arc::new(MemoryCollection::new());
        (QueryService::new(store.clone(), QuotaLimits::default()), store)
    }

    fn created() -> UserCreated {
        UserCreated {
            user_id: "user-1".into(),
            username: "ada".into(),
            email: "ada@example.com".into(),
        }
    }

    fn summary(id: &str) -> VideoSummary {
        VideoSummary {
            id: id.into(),
            title: "clip".into(),
            size: MIB,
            url: format!("memory://{}", id),
            storage_key: None,
            created_at: None,
        }
    }

    #[tokio::test]
    async fn test_user_created_once() {
        let (service, store) = queries();
        assert!(service.create_user(&created()).await.unwrap());
        assert!(!service.create_user(&created()).await.unwrap());
        assert_eq!(store.len(), 1);

        let view = service.get("user-1").await.unwrap();
        assert_eq!(view.storage.free, 50 * MIB);
        assert_eq!(view.usage.limit, 100 * MIB);
    }

    #[tokio::test]
    async fn test_video_before_user_created() {
        let (service, _) = queries();
        assert!(service.add_video("user-1", &summary("v1")).await.unwrap());
        service.create_user(&created()).await.unwrap();

        let view = service.get("user-1").await.unwrap();
        assert_eq!(view.username, "ada");
        assert_eq!(view.gallery.videos.len(), 1);
    }

    #[tokio::test]
    async fn test_counters_copied_verbatim() {
        let (service, _) = queries();
        service.create_user(&created()).await.unwrap();
        let update = UsageUpdated {
            user_id: "user-1".into(),
            bandwidth_total_usage: 1000,
            bandwidth_daily_usage: 1000,
            daily_limit: 100 * MIB,
            free_bandwidth: 100 * MIB - 1000,
            version: 2,
        };
        assert!(service.apply_usage_update(&update).await.unwrap());
        let stale = UsageUpdated {
            bandwidth_total_usage: 0,
            version: 1,
            ..update.clone()
        };
        assert!(!service.apply_usage_update(&stale).await.unwrap());
        assert_eq!(service.get("user-1").await.unwrap().usage.total, 1000);
    }

    #[tokio::test]
    async fn test_event_gallery_counts() {
        let store: Arc<MemoryCollection<EventGalleryStats>> = Arc::new(MemoryCollection::new());
        let service = EventGalleryService::new(store);

        assert_eq!(service.adjust("evt-1", 1).await.unwrap(), 1);
        assert_eq!(service.adjust("evt-1", 1).await.unwrap(), 2);
        assert_eq!(service.adjust("evt-1", -1).await.unwrap(), 1);
        assert_eq!(service.adjust("evt-2", -1).await.unwrap(), 0);
        assert_eq!(service.get("evt-1").await.unwrap().total_videos, 1);
        assert!(matches!(service.get("evt-3").await, Err(AppError::NotFound(_))));
    }
}
