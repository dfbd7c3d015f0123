/// Frames pushed to WebSocket clients
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RealtimeMessage {
    /// Named application event, e.g. `notification` or `notificationRemoved`
    Event { event: String, payload: Value },

    /// Connection established confirmation
    Connected {
        user_id: String,
        connection_id: String,
        timestamp: i64,
    },

    /// Error message from server
    Error { code: String, message: String },
}

impl RealtimeMessage {
    pub fn event(event: impl Into<String>, payload: Value) -> Self {
        RealtimeMessage::Event {
            event: event.into(),
            payload,
        }
    }

    pub fn connected(user_id: impl Into<String>, connection_id: impl Into<String>) -> Self {
        RealtimeMessage::Connected {
            user_id: user_id.into(),
            connection_id: connection_id.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        RealtimeMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
