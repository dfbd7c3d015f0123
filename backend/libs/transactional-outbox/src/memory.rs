use crate::{OutboxError, OutboxEvent, OutboxRepository, OutboxResult};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

/// Process-local outbox for tests and `STORE_BACKEND=memory` deployments.
#[derive(Default)]
pub struct InMemoryOutboxRepository {
    events: Mutex<Vec<OutboxEvent>>,
}

impl InMemoryOutboxRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record, delivered or not, in insertion order.
    pub fn all(&self) -> Vec<OutboxEvent> {
        self.events.lock().clone()
    }

    /// Drop delivered records.
    pub fn purge_published(&self) -> usize {
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.published_at.is_none());
        before - events.len()
    }

    /// Re-queue everything created since `ts`, delivered or not.
    pub fn replay_since(&self, ts: chrono::DateTime<Utc>) -> u64 {
        let mut events = self.events.lock();
        let mut replayed = 0;
        for event in events.iter_mut().filter(|e| e.created_at >= ts) {
            event.published_at = None;
            event.retry_count = 0;
            event.last_error = None;
            event.last_attempt_at = None;
            replayed += 1;
        }
        replayed
    }
}

#[async_trait]
impl OutboxRepository for InMemoryOutboxRepository {
    async fn insert(&self, event: &OutboxEvent) -> OutboxResult<()> {
        self.events.lock().push(event.clone());
        Ok(())
    }

    async fn get_unpublished(&self, limit: i32) -> OutboxResult<Vec<OutboxEvent>> {
        let mut pending: Vec<OutboxEvent> = self
            .events
            .lock()
            .iter()
            .filter(|e| e.published_at.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| {
            a.retry_count
                .cmp(&b.retry_count)
                .then(a.created_at.cmp(&b.created_at))
        });
        pending.truncate(limit.max(0) as usize);
        Ok(pending)
    }

    async fn mark_published(&self, id: Uuid) -> OutboxResult<()> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(OutboxError::RecordNotFound(id))?;
        event.published_at = Some(Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, error: &str) -> OutboxResult<()> {
        let mut events = self.events.lock();
        let event = events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or(OutboxError::RecordNotFound(id))?;
        event.retry_count += 1;
        event.last_error = Some(error.to_string());
        event.last_attempt_at = Some(Utc::now());
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let events = self.events.lock();
        let pending: Vec<_> = events.iter().filter(|e| e.published_at.is_none()).collect();
        let age = pending
            .iter()
            .map(|e| e.created_at)
            .min()
            .map(|oldest| (Utc::now() - oldest).num_seconds())
            .unwrap_or(0);
        Ok((pending.len() as i64, age))
    }
}
