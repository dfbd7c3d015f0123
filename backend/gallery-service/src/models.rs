/// Data models for gallery-service
use chrono::{DateTime, Utc};
use document_store::Document;
use quota_events::{StorageUpdated, UsageUpdated, VideoSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const GALLERY_NOT_FOUND_MSG: &str = "Gallery not found";
pub const VIDEO_NOT_FOUND_MSG: &str = "Video not found";
pub const INSUFFICIENT_STORAGE_MSG: &str = "Insufficient storage space";
pub const BANDWIDTH_EXCEEDED_MSG: &str = "Video exceeds daily bandwidth limit";

/// Why an upload cannot be admitted against the gallery's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum QuotaError {
    #[error("{}", INSUFFICIENT_STORAGE_MSG)]
    InsufficientStorage,

    #[error("{}", BANDWIDTH_EXCEEDED_MSG)]
    BandwidthExceeded,
}

/// A user's video gallery and the local counters uploads are validated against.
///
/// `free_storage` and `free_bandwidth` are decremented on upload and refreshed by
/// `StorageUpdated` / `UsageUpdated` from the quota service. The `*_version` fields hold
/// the ledger sequence of the last update applied so a late, older update is ignored.
///
/// A refresh never raises a counter above what this gallery accounts for itself: the
/// ledger may not have seen uploads admitted here yet, so `reserved_bytes` (uploads in
/// progress) and `admitted_bandwidth` (bytes ever admitted) bound the values taken over.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GalleryAggregate {
    pub user_id: String,
    pub free_storage: u64,
    pub free_bandwidth: u64,
    #[serde(default)]
    pub videos: Vec<VideoRecord>,
    /// Bytes reserved by uploads that have not been recorded as videos yet
    #[serde(default)]
    pub reserved_bytes: u64,
    /// Bandwidth consumed by every upload admitted here
    #[serde(default)]
    pub admitted_bandwidth: u64,
    #[serde(default)]
    pub storage_version: u64,
    #[serde(default)]
    pub usage_version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Document for GalleryAggregate {
    const COLLECTION: &'static str = "galleries";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl GalleryAggregate {
    pub fn new(user_id: impl Into<String>, free_storage: u64, free_bandwidth: u64) -> Self {
        let now = Utc::now();
        Self {
            user_id: user_id.into(),
            free_storage,
            free_bandwidth,
            videos: Vec::new(),
            reserved_bytes: 0,
            admitted_bandwidth: 0,
            storage_version: 0,
            usage_version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn find_video(&self, video_id: &str) -> Option<&VideoRecord> {
        self.videos.iter().find(|v| v.id == video_id)
    }

    /// Check both counters and take `size` bytes from each. Leaves the gallery untouched
    /// when either check fails.
    pub fn reserve(&mut self, size: u64) -> Result<(), QuotaError> {
        if size > self.free_storage {
            return Err(QuotaError::InsufficientStorage);
        }
        if size > self.free_bandwidth {
            return Err(QuotaError::BandwidthExceeded);
        }
        self.free_storage -= size;
        self.free_bandwidth -= size;
        self.reserved_bytes = self.reserved_bytes.saturating_add(size);
        self.admitted_bandwidth = self.admitted_bandwidth.saturating_add(size);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Turn a reservation into a stored video.
    pub fn commit_video(&mut self, video: VideoRecord) {
        self.reserved_bytes = self.reserved_bytes.saturating_sub(video.size);
        self.videos.push(video);
        self.updated_at = Utc::now();
    }

    /// Undo a [`reserve`](Self::reserve) whose upload did not complete.
    pub fn release(&mut self, size: u64) {
        self.free_storage = self.free_storage.saturating_add(size);
        self.free_bandwidth = self.free_bandwidth.saturating_add(size);
        self.reserved_bytes = self.reserved_bytes.saturating_sub(size);
        self.admitted_bandwidth = self.admitted_bandwidth.saturating_sub(size);
        self.updated_at = Utc::now();
    }

    /// Bytes held by stored videos and uploads in progress.
    pub fn accounted_storage(&self) -> u64 {
        self.videos
            .iter()
            .map(|v| v.size)
            .fold(self.reserved_bytes, u64::saturating_add)
    }

    /// Remove a video and give its size back to storage. Bandwidth is spent for good.
    pub fn remove_video(&mut self, video_id: &str) -> Option<VideoRecord> {
        let index = self.videos.iter().position(|v| v.id == video_id)?;
        let removed = self.videos.remove(index);
        self.free_storage = self.free_storage.saturating_add(removed.size);
        self.updated_at = Utc::now();
        Some(removed)
    }

    /// Take over `free_storage` unless `update` is older than the last one applied,
    /// capped by the space this gallery already holds.
    pub fn apply_storage_update(&mut self, update: &StorageUpdated) -> bool {
        if update.version < self.storage_version {
            return false;
        }
        let local_free = update.total_storage.saturating_sub(self.accounted_storage());
        self.free_storage = update.free_storage.min(local_free);
        self.storage_version = update.version;
        self.updated_at = Utc::now();
        true
    }

    /// Take over `free_bandwidth` unless `update` is older than the last one applied,
    /// capped by the bandwidth this gallery has already admitted.
    pub fn apply_usage_update(&mut self, update: &UsageUpdated) -> bool {
        if update.version < self.usage_version {
            return false;
        }
        let local_free = update.daily_limit.saturating_sub(self.admitted_bandwidth);
        self.free_bandwidth = update.free_bandwidth.min(local_free);
        self.usage_version = update.version;
        self.updated_at = Utc::now();
        true
    }
}

/// A stored video, embedded in its gallery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
    pub id: String,
    pub title: String,
    pub size: u64,
    pub url: String,
    /// Object key at the storage provider
    pub storage_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    /// Social event this video belongs to, for event galleries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn summary(&self) -> VideoSummary {
        VideoSummary {
            id: self.id.clone(),
            title: self.title.clone(),
            size: self.size,
            url: self.url.clone(),
            storage_key: Some(self.storage_key.clone()),
            created_at: Some(self.created_at),
        }
    }
}

/// Metadata parts of an upload request.
#[derive(Debug, Clone, Default)]
pub struct VideoMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub thumbnail: Option<String>,
    pub duration: Option<f64>,
    pub event_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    pub video: VideoRecord,
    pub gallery: GalleryAggregate,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub message: String,
    pub gallery: GalleryAggregate,
}
