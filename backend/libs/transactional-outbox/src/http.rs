use crate::{OutboxError, OutboxEvent, OutboxPublisher, OutboxResult};
use anyhow::Context;
use async_trait::async_trait;
use quota_events::Destination;
use resilience::timeout::{with_timeout, TimeoutError};
use std::time::Duration;
use tracing::debug;

/// Base URL of the service hosting each destination's consumer route.
#[derive(Debug, Clone, PartialEq)]
pub struct DestinationUrls {
    pub queries: String,
    pub storage: String,
    pub usage_monitoring: String,
    pub videos: String,
}

impl DestinationUrls {
    /// Quota consumers live in one service and the gallery consumer in another, so two
    /// base URLs cover every destination. Each destination can still be overridden.
    pub fn new(quota_base_url: &str, gallery_base_url: &str) -> Self {
        Self {
            queries: quota_base_url.to_string(),
            storage: quota_base_url.to_string(),
            usage_monitoring: quota_base_url.to_string(),
            videos: gallery_base_url.to_string(),
        }
    }

    /// `QUOTA_SERVICE_URL`, `GALLERY_SERVICE_URL`, then per-destination
    /// `QUERIES_URL`, `STORAGE_URL`, `USAGE_MONITORING_URL`, `VIDEOS_URL`.
    pub fn from_env() -> Self {
        let quota = std::env::var("QUOTA_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8082".to_string());
        let gallery = std::env::var("GALLERY_SERVICE_URL")
            .unwrap_or_else(|_| "http://localhost:8081".to_string());

        let mut urls = Self::new(&quota, &gallery);
        let overrides = [
            ("QUERIES_URL", &mut urls.queries),
            ("STORAGE_URL", &mut urls.storage),
            ("USAGE_MONITORING_URL", &mut urls.usage_monitoring),
            ("VIDEOS_URL", &mut urls.videos),
        ];
        for (key, slot) in overrides {
            if let Ok(value) = std::env::var(key) {
                *slot = value;
            }
        }
        urls
    }

    pub fn base_url(&self, destination: Destination) -> &str {
        match destination {
            Destination::Queries => &self.queries,
            Destination::Storage => &self.storage,
            Destination::UsageMonitoring => &self.usage_monitoring,
            Destination::Videos => &self.videos,
        }
    }

    /// Full consumer URL: base URL plus the destination's fixed path.
    pub fn url(&self, destination: Destination) -> String {
        format!(
            "{}{}",
            self.base_url(destination).trim_end_matches('/'),
            destination.path()
        )
    }
}

/// POSTs the `{eventId, type, data}` envelope to the destination's consumer route.
pub struct HttpOutboxPublisher {
    client: reqwest::Client,
    urls: DestinationUrls,
    timeout: Duration,
}

impl HttpOutboxPublisher {
    pub fn new(urls: DestinationUrls, timeout: Duration) -> OutboxResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .context("HTTP client setup failed")?;

        Ok(Self {
            client,
            urls,
            timeout,
        })
    }
}

#[async_trait]
impl OutboxPublisher for HttpOutboxPublisher {
    async fn publish(&self, event: &OutboxEvent) -> OutboxResult<()> {
        let url = self.urls.url(event.destination);
        let envelope = event.envelope();

        let response = with_timeout(
            self.timeout,
            self.client.post(&url).json(&envelope).send(),
        )
        .await
        .map_err(|e: TimeoutError| unreachable(event.destination, &url, e))?
        .map_err(|e| unreachable(event.destination, &url, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboxError::Rejected {
                destination: event.destination,
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            record_id = %event.id,
            event_id = %event.event_id,
            event_type = %event.event_type,
            url = %url,
            "Event delivered"
        );

        Ok(())
    }
}

fn unreachable(destination: Destination, url: &str, reason: impl std::fmt::Display) -> OutboxError {
    OutboxError::Unreachable {
        destination,
        url: url.to_string(),
        reason: reason.to_string(),
    }
}
