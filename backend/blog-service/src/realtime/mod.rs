//! Real-time push to connected users.
//!
//! [`RealtimeTransport`] is an explicit handle passed to whatever needs to push; nothing
//! registers itself globally. Until [`RealtimeTransport::start`] is called every
//! [`RealtimeTransport::emit`] fails with [`TransportError::NotStarted`].

mod messages;

pub use messages::RealtimeMessage;

use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

pub type ConnectionSender = mpsc::UnboundedSender<RealtimeMessage>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("real-time transport has not been started")]
    NotStarted,

    #[error("failed to encode payload: {0}")]
    Encoding(#[from] serde_json::Error),
}

struct Connection {
    id: Uuid,
    sender: ConnectionSender,
}

/// Connections per user id. One user may hold several (tabs, devices).
#[derive(Clone, Default)]
pub struct RealtimeTransport {
    connections: Arc<RwLock<HashMap<String, Vec<Connection>>>>,
    started: Arc<AtomicBool>,
}

impl RealtimeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self) {
        self.started.store(true, Ordering::SeqCst);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    /// Register a connection for `user_id`, returning its id for [`Self::unsubscribe`].
    pub async fn subscribe(&self, user_id: &str, sender: ConnectionSender) -> Uuid {
        let id = Uuid::new_v4();
        let mut connections = self.connections.write().await;
        connections
            .entry(user_id.to_string())
            .or_default()
            .push(Connection { id, sender });
        id
    }

    pub async fn unsubscribe(&self, user_id: &str, connection_id: Uuid) {
        let mut connections = self.connections.write().await;
        if let Some(list) = connections.get_mut(user_id) {
            list.retain(|c| c.id != connection_id);
            if list.is_empty() {
                connections.remove(user_id);
            }
        }
    }

    /// Push `event` to every connection of `to_user_id`.
    ///
    /// Returns how many connections accepted the frame. A user with no open connection is
    /// not an error; closed connections are dropped on the way.
    pub async fn emit<P: Serialize>(
        &self,
        to_user_id: &str,
        event: &str,
        payload: &P,
    ) -> Result<usize, TransportError> {
        if !self.is_started() {
            return Err(TransportError::NotStarted);
        }
        let message = RealtimeMessage::event(event, serde_json::to_value(payload)?);

        let mut connections = self.connections.write().await;
        let Some(list) = connections.get_mut(to_user_id) else {
            debug!(user_id = %to_user_id, event, "No open connection for recipient");
            return Ok(0);
        };
        list.retain(|c| c.sender.send(message.clone()).is_ok());
        let delivered = list.len();
        if list.is_empty() {
            connections.remove(to_user_id);
        }
        Ok(delivered)
    }

    pub async fn connection_count(&self, user_id: &str) -> usize {
        let connections = self.connections.read().await;
        connections.get(user_id).map(|v| v.len()).unwrap_or(0)
    }

    pub async fn total_connections(&self) -> usize {
        let connections = self.connections.read().await;
        connections.values().map(|v| v.len()).sum()
    }
}
