use crate::event_types;
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// ACCOUNT EVENTS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserCreated {
    pub user_id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

// ============================================================================
// GALLERY EVENTS
// ============================================================================

/// Denormalised view of an uploaded video carried by `videoAdded`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoSummary {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub size: u64,
    #[serde(default)]
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoAdded {
    pub user_id: String,
    pub video: VideoSummary,
    /// Social event the video was uploaded to (event galleries only).
    #[serde(
        rename = "eventId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gallery_event_id: Option<String>,
}

impl VideoAdded {
    pub fn event_type(&self) -> &'static str {
        if self.gallery_event_id.is_some() {
            event_types::EVENT_VIDEO_ADDED
        } else {
            event_types::VIDEO_ADDED
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoRemoved {
    pub user_id: String,
    pub video_id: String,
    pub video_size: u64,
    #[serde(
        rename = "eventId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub gallery_event_id: Option<String>,
}

impl VideoRemoved {
    pub fn event_type(&self) -> &'static str {
        if self.gallery_event_id.is_some() {
            event_types::EVENT_VIDEO_REMOVED
        } else {
            event_types::VIDEO_REMOVED
        }
    }
}

// ============================================================================
// QUOTA EVENTS
// ============================================================================

/// Storage counters published after every ledger change. `version` is the ledger
/// sequence the counters were derived from; older versions must not overwrite newer ones.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StorageUpdated {
    pub user_id: String,
    pub total_storage: u64,
    pub used_storage: u64,
    pub free_storage: u64,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageUpdated {
    pub user_id: String,
    pub bandwidth_total_usage: u64,
    pub bandwidth_daily_usage: u64,
    pub daily_limit: u64,
    pub free_bandwidth: u64,
    #[serde(default)]
    pub version: u64,
}

/// Every event the consumers understand.
#[derive(Debug, Clone, PartialEq)]
pub enum QuotaEvent {
    UserCreated(UserCreated),
    VideoAdded(VideoAdded),
    VideoRemoved(VideoRemoved),
    StorageUpdated(StorageUpdated),
    UsageUpdated(UsageUpdated),
}

impl QuotaEvent {
    /// Decode `data` according to `event_type`. Unknown types yield `Ok(None)`.
    pub fn parse(event_type: &str, data: &Value) -> Result<Option<Self>, serde_json::Error> {
        let event = match event_type {
            event_types::USER_CREATED => Self::UserCreated(UserCreated::deserialize(data)?),
            event_types::VIDEO_ADDED | event_types::VIDEOS_ADDED => {
                Self::VideoAdded(VideoAdded::deserialize(data)?)
            }
            event_types::EVENT_VIDEO_ADDED => {
                let added = VideoAdded::deserialize(data)?;
                if added.gallery_event_id.is_none() {
                    return Err(serde_json::Error::custom("eventVideoAdded requires eventId"));
                }
                Self::VideoAdded(added)
            }
            event_types::VIDEO_REMOVED => Self::VideoRemoved(VideoRemoved::deserialize(data)?),
            event_types::EVENT_VIDEO_REMOVED => {
                let removed = VideoRemoved::deserialize(data)?;
                if removed.gallery_event_id.is_none() {
                    return Err(serde_json::Error::custom(
                        "eventVideoRemoved requires eventId",
                    ));
                }
                Self::VideoRemoved(removed)
            }
            event_types::STORAGE_UPDATED => {
                Self::StorageUpdated(StorageUpdated::deserialize(data)?)
            }
            event_types::USAGE_UPDATED => Self::UsageUpdated(UsageUpdated::deserialize(data)?),
            _ => return Ok(None),
        };
        Ok(Some(event))
    }

    /// Wire `type` this event is emitted as.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::UserCreated(_) => event_types::USER_CREATED,
            Self::VideoAdded(e) => e.event_type(),
            Self::VideoRemoved(e) => e.event_type(),
            Self::StorageUpdated(_) => event_types::STORAGE_UPDATED,
            Self::UsageUpdated(_) => event_types::USAGE_UPDATED,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::UserCreated(e) => &e.user_id,
            Self::VideoAdded(e) => &e.user_id,
            Self::VideoRemoved(e) => &e.user_id,
            Self::StorageUpdated(e) => &e.user_id,
            Self::UsageUpdated(e) => &e.user_id,
        }
    }

    /// Serialized `data` object.
    pub fn data(&self) -> Result<Value, serde_json::Error> {
        match self {
            Self::UserCreated(e) => serde_json::to_value(e),
            Self::VideoAdded(e) => serde_json::to_value(e),
            Self::VideoRemoved(e) => serde_json::to_value(e),
            Self::StorageUpdated(e) => serde_json::to_value(e),
            Self::UsageUpdated(e) => serde_json::to_value(e),
        }
    }
}

impl From<UserCreated> for QuotaEvent {
    fn from(e: UserCreated) -> Self {
        Self::UserCreated(e)
    }
}

impl From<VideoAdded> for QuotaEvent {
    fn from(e: VideoAdded) -> Self {
        Self::VideoAdded(e)
    }
}

impl From<VideoRemoved> for QuotaEvent {
    fn from(e: VideoRemoved) -> Self {
        Self::VideoRemoved(e)
    }
}

impl From<StorageUpdated> for QuotaEvent {
    fn from(e: StorageUpdated) -> Self {
        Self::StorageUpdated(e)
    }
}

impl From<UsageUpdated> for QuotaEvent {
    fn from(e: UsageUpdated) -> Self {
        Self::UsageUpdated(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plural_alias_parses_as_video_added() {
        let data = json!({"userId": "u1", "video": {"size": 1000}});
        let event = QuotaEvent::parse("videosAdded", &data).unwrap().unwrap();

        match event {
            QuotaEvent::VideoAdded(added) => {
                assert_eq!(added.video.size, 1000);
                assert!(added.video.id.is_empty());
                assert_eq!(added.event_type(), "videoAdded");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn unknown_type_is_ignored() {
        assert!(QuotaEvent::parse("VideoTranscoded", &json!({})).unwrap().is_none());
    }

    #[test]
    fn event_variant_requires_gallery_event_id() {
        let data = json!({"userId": "u1", "videoId": "v1", "videoSize": 5});
        assert!(QuotaEvent::parse("eventVideoRemoved", &data).is_err());

        let data = json!({"userId": "u1", "videoId": "v1", "videoSize": 5, "eventId": "e9"});
        let event = QuotaEvent::parse("eventVideoRemoved", &data).unwrap().unwrap();
        assert_eq!(event.event_type(), "eventVideoRemoved");
        assert_eq!(event.user_id(), "u1");
    }

    #[test]
    fn storage_updated_without_version_defaults_to_zero() {
        let data = json!({
            "userId": "u1",
            "totalStorage": 100,
            "usedStorage": 10,
            "freeStorage": 90
        });
        let event = QuotaEvent::parse("StorageUpdated", &data).unwrap().unwrap();
        assert_eq!(
            event,
            QuotaEvent::StorageUpdated(StorageUpdated {
                user_id: "u1".into(),
                total_storage: 100,
                used_storage: 10,
                free_storage: 90,
                version: 0,
            })
        );
    }

    #[test]
    fn data_uses_camel_case_wire_names() {
        let event = QuotaEvent::from(VideoRemoved {
            user_id: "u1".into(),
            video_id: "v1".into(),
            video_size: 42,
            gallery_event_id: None,
        });
        assert_eq!(
            event.data().unwrap(),
            json!({"userId": "u1", "videoId": "v1", "videoSize": 42})
        );
    }
}
