//! Event catalogue for the quota propagation protocol
//!
//! Gallery, storage, usage-monitoring and query consumers exchange these events as plain
//! HTTP callbacks. The wire shape is `{ "eventId"?, "type", "data" }`. `eventId` is
//! optional on input for producers that predate it; everything emitted through the
//! outbox carries one.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub mod destination;
pub mod events;

pub use destination::Destination;
pub use events::{
    QuotaEvent, StorageUpdated, UsageUpdated, UserCreated, VideoAdded, VideoRemoved,
    VideoSummary,
};

pub const MIB: u64 = 1024 * 1024;

/// Storage every new account is provisioned with.
pub const DEFAULT_TOTAL_STORAGE: u64 = 50 * MIB;

/// Daily bandwidth every new account is provisioned with.
pub const DEFAULT_DAILY_BANDWIDTH: u64 = 100 * MIB;

/// Wire `type` strings.
pub mod event_types {
    pub const USER_CREATED: &str = "UserCreated";
    pub const VIDEO_ADDED: &str = "videoAdded";
    /// Older producers send the plural form.
    pub const VIDEOS_ADDED: &str = "videosAdded";
    pub const VIDEO_REMOVED: &str = "videoRemoved";
    pub const EVENT_VIDEO_ADDED: &str = "eventVideoAdded";
    pub const EVENT_VIDEO_REMOVED: &str = "eventVideoRemoved";
    pub const STORAGE_UPDATED: &str = "StorageUpdated";
    pub const USAGE_UPDATED: &str = "UsageUpdated";
}

/// Envelope POSTed to every consumer endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct EventEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<Uuid>,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl EventEnvelope {
    pub fn new(event_id: Uuid, event_type: impl Into<String>, data: Value) -> Self {
        Self {
            event_id: Some(event_id),
            event_type: event_type.into(),
            data,
        }
    }

    /// Decode into a known event. `Ok(None)` for types this catalogue does not know.
    pub fn parse(&self) -> Result<Option<QuotaEvent>, serde_json::Error> {
        QuotaEvent::parse(&self.event_type, &self.data)
    }
}
