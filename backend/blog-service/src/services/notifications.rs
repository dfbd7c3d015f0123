//! Notification fan-out: persist, then push to the recipient's open connections.

use crate::error::{AppError, Result};
use crate::metrics;
use crate::models::{correlation_key, new_id, Notification, NotificationKind};
use crate::realtime::RealtimeTransport;
use chrono::Utc;
use document_store::{modify, DocumentCollection, Filter};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub const NOTIFICATION_EVENT: &str = "notification";
pub const NOTIFICATION_REMOVED_EVENT: &str = "notificationRemoved";

/// What a notification points at besides its recipient.
#[derive(Debug, Clone, Default)]
pub struct NotificationTarget {
    pub blog_id: Option<String>,
    pub comment_id: Option<String>,
}

#[derive(Clone)]
pub struct NotificationService {
    notifications: Arc<dyn DocumentCollection<Notification>>,
    transport: RealtimeTransport,
}

impl NotificationService {
    pub fn new(
        notifications: Arc<dyn DocumentCollection<Notification>>,
        transport: RealtimeTransport,
    ) -> Self {
        Self {
            notifications,
            transport,
        }
    }

    /// Store a notification and push it. `target_id` feeds the correlation key that
    /// [`Self::retract`] looks it up by.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        recipient_id: &str,
        actor_id: &str,
        target_id: &str,
        target: NotificationTarget,
        message: String,
    ) -> Result<Notification> {
        let notification = Notification {
            id: new_id(),
            recipient_id: recipient_id.to_string(),
            actor_id: actor_id.to_string(),
            kind,
            blog_id: target.blog_id,
            comment_id: target.comment_id,
            message,
            correlation_key: correlation_key(kind, actor_id, target_id),
            read: false,
            created_at: Utc::now(),
        };
        let stored = self.notifications.insert(notification).await?.doc;
        debug!(
            notification_id = %stored.id,
            recipient_id = %stored.recipient_id,
            kind = kind.as_str(),
            "Notification stored"
        );

        self.push(&stored.recipient_id, NOTIFICATION_EVENT, &stored).await;
        Ok(stored)
    }

    /// Delete the notifications for `(kind, actor, target)` and tell their recipients.
    pub async fn retract(
        &self,
        kind: NotificationKind,
        actor_id: &str,
        target_id: &str,
    ) -> Result<Vec<Notification>> {
        let key = correlation_key(kind, actor_id, target_id);
        let removed = self
            .notifications
            .delete_many(&Filter::new().eq("correlationKey", key.as_str()))
            .await?;
        if removed.is_empty() {
            debug!(correlation_key = %key, "No notification to retract");
        }
        self.announce_removed(&removed).await;
        Ok(removed)
    }

    /// Push `notificationRemoved` for notifications already deleted elsewhere.
    pub async fn announce_removed(&self, removed: &[Notification]) {
        for notification in removed {
            let payload = json!({
                "id": notification.id,
                "type": notification.kind,
                "correlationKey": notification.correlation_key,
            });
            self.push(&notification.recipient_id, NOTIFICATION_REMOVED_EVENT, &payload)
                .await;
        }
    }

    /// Newest first.
    pub async fn list_for(&self, user_id: &str) -> Result<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .notifications
            .find(&Filter::new().eq("recipientId", user_id))
            .await?
            .into_iter()
            .map(|v| v.doc)
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(notifications)
    }

    pub async fn mark_read(&self, notification_id: &str) -> Result<Notification> {
        let updated = modify(self.notifications.as_ref(), notification_id, |n| {
            n.read = true;
            Ok::<_, AppError>(())
        })
        .await?;
        updated
            .map(|(v, _)| v.doc)
            .ok_or_else(|| AppError::not_found("Notification not found"))
    }

    /// Transport problems never fail the action that caused the push.
    async fn push<P: serde::Serialize>(&self, recipient_id: &str, event: &str, payload: &P) {
        match self.transport.emit(recipient_id, event, payload).await {
            Ok(delivered) => {
                metrics::record_push(event, true);
                if delivered > 0 {
                    info!(recipient_id = %recipient_id, event, delivered, "Notification pushed");
                }
            }
            Err(e) => {
                metrics::record_push(event, false);
                warn!(recipient_id = %recipient_id, event, error = %e, "Real-time push failed");
            }
        }
    }
}
