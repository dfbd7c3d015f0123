//! Read-models kept by the quota consumers.

use super::ledger::QuotaLedger;
use chrono::{DateTime, Utc};
use document_store::Document;
use quota_events::{StorageUpdated, UsageUpdated, VideoSummary};
use serde::{Deserialize, Serialize};

/// Storage read-model, rebuilt from the ledger after every storage-relevant event.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageAggregate {
    pub user_id: String,
    pub total_storage: u64,
    pub used_storage: u64,
    pub free_storage: u64,
    /// Ledger head this projection was built from
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Document for StorageAggregate {
    const COLLECTION: &'static str = "storage";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl StorageAggregate {
    pub fn project(ledger: &QuotaLedger) -> Self {
        let totals = ledger.storage();
        Self {
            user_id: ledger.user_id.clone(),
            total_storage: totals.total,
            used_storage: totals.used,
            free_storage: totals.free,
            version: ledger.head(),
            updated_at: Utc::now(),
        }
    }

    pub fn to_event(&self) -> StorageUpdated {
        StorageUpdated {
            user_id: self.user_id.clone(),
            total_storage: self.total_storage,
            used_storage: self.used_storage,
            free_storage: self.free_storage,
            version: self.version,
        }
    }
}

/// Bandwidth read-model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageAggregate {
    pub user_id: String,
    pub bandwidth_total_usage: u64,
    pub bandwidth_daily_usage: u64,
    pub daily_limit: u64,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Document for UsageAggregate {
    const COLLECTION: &'static str = "usage_monitoring";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl UsageAggregate {
    pub fn project(ledger: &QuotaLedger) -> Self {
        let totals = ledger.usage();
        Self {
            user_id: ledger.user_id.clone(),
            bandwidth_total_usage: totals.total,
            bandwidth_daily_usage: totals.daily,
            daily_limit: totals.limit,
            version: ledger.head(),
            updated_at: Utc::now(),
        }
    }

    pub fn free_bandwidth(&self) -> u64 {
        self.daily_limit.saturating_sub(self.bandwidth_daily_usage)
    }

    pub fn to_event(&self) -> UsageUpdated {
        UsageUpdated {
            user_id: self.user_id.clone(),
            bandwidth_total_usage: self.bandwidth_total_usage,
            bandwidth_daily_usage: self.bandwidth_daily_usage,
            daily_limit: self.daily_limit,
            free_bandwidth: self.free_bandwidth(),
            version: self.version,
        }
    }
}

/// Read-models that carry the ledger head they were projected from.
pub trait Projection: Document {
    fn version(&self) -> u64;
}

impl Projection for StorageAggregate {
    fn version(&self) -> u64 {
        self.version
    }
}

impl Projection for UsageAggregate {
    fn version(&self) -> u64 {
        self.version
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryGallery {
    pub videos: Vec<VideoSummary>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageView {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UsageView {
    pub total: u64,
    pub daily: u64,
    pub limit: u64,
}

/// Denormalised per-user view for reads. Never authoritative.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueryAggregate {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub gallery: QueryGallery,
    pub storage: StorageView,
    pub usage: UsageView,
    #[serde(default)]
    pub storage_version: u64,
    #[serde(default)]
    pub usage_version: u64,
    pub updated_at: DateTime<Utc>,
}

impl Document for QueryAggregate {
    const COLLECTION: &'static str = "queries";

    fn id(&self) -> &str {
        &self.user_id
    }
}

impl QueryAggregate {
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        email: impl Into<String>,
        total_storage: u64,
        daily_limit: u64,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            email: email.into(),
            gallery: QueryGallery::default(),
            storage: StorageView {
                total: total_storage,
                used: 0,
                free: total_storage,
            },
            usage: UsageView {
                total: 0,
                daily: 0,
                limit: daily_limit,
            },
            storage_version: 0,
            usage_version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Add a video summary unless already listed. Returns whether it was added.
    pub fn add_video(&mut self, video: VideoSummary) -> bool {
        if self.gallery.videos.iter().any(|v| v.id == video.id) {
            return false;
        }
        self.gallery.videos.push(video);
        self.updated_at = Utc::now();
        true
    }

    pub fn remove_video(&mut self, video_id: &str) -> bool {
        let before = self.gallery.videos.len();
        self.gallery.videos.retain(|v| v.id != video_id);
        self.updated_at = Utc::now();
        self.gallery.videos.len() != before
    }

    /// Copy the carried counters verbatim unless `update` is older than the last applied.
    pub fn apply_storage_update(&mut self, update: &StorageUpdated) -> bool {
        if update.version < self.storage_version {
            return false;
        }
        self.storage = StorageView {
            total: update.total_storage,
            used: update.used_storage,
            free: update.free_storage,
        };
        self.storage_version = update.version;
        self.updated_at = Utc::now();
        true
    }

    pub fn apply_usage_update(&mut self, update: &UsageUpdated) -> bool {
        if update.version < self.usage_version {
            return false;
        }
        self.usage = UsageView {
            total: update.bandwidth_total_usage,
            daily: update.bandwidth_daily_usage,
            limit: update.daily_limit,
        };
        self.usage_version = update.version;
        self.updated_at = Utc::now();
        true
    }
}

/// Video count of one social event's gallery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventGalleryStats {
    pub event_id: String,
    pub total_videos: u64,
    pub updated_at: DateTime<Utc>,
}

impl Document for EventGalleryStats {
    const COLLECTION: &'static str = "event_gallery_stats";

    fn id(&self) -> &str {
        &self.event_id
    }
}

impl EventGalleryStats {
    pub fn new(event_id: impl Into<String>) -> Self {
        Self {
            event_id: event_id.into(),
            total_videos: 0,
            updated_at: Utc::now(),
        }
    }

    /// Add `delta` videos, never going below zero.
    pub fn adjust(&mut self, delta: i64) {
        self.total_videos = if delta >= 0 {
            self.total_videos.saturating_add(delta as u64)
        } else {
            self.total_videos.saturating_sub(delta.unsigned_abs())
        };
        self.updated_at = Utc::now();
    }
}
