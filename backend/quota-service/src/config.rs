/// Configuration management for quota-service
///
/// Loads configuration from environment variables with sensible defaults.
use document_store::StoreBackend;
use quota_events::{DEFAULT_DAILY_BANDWIDTH, DEFAULT_TOTAL_STORAGE};
use std::time::Duration;
use transactional_outbox::DestinationUrls;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreBackend,
    pub quota: QuotaLimits,
    pub outbox: OutboxConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

/// Limits written into a ledger when its user is provisioned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaLimits {
    pub total_storage: u64,
    pub daily_limit: u64,
}

impl Default for QuotaLimits {
    fn default() -> Self {
        Self {
            total_storage: DEFAULT_TOTAL_STORAGE,
            daily_limit: DEFAULT_DAILY_BANDWIDTH,
        }
    }
}

#[derive(Clone, Debug)]
pub struct OutboxConfig {
    pub batch_size: i32,
    pub poll_interval: Duration,
    pub max_retries: i32,
    pub publish_timeout: Duration,
    pub destinations: DestinationUrls,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        Ok(Config {
            app: AppConfig {
                host: std::env::var("QUOTA_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("QUOTA_SERVICE_PORT")
                    .unwrap_or_else(|_| "8082".to_string())
                    .parse()
                    .unwrap_or(8082),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            store: StoreBackend::from_env()?,
            quota: QuotaLimits {
                total_storage: env_parse("QUOTA_TOTAL_STORAGE_BYTES", DEFAULT_TOTAL_STORAGE),
                daily_limit: env_parse("QUOTA_DAILY_BANDWIDTH_BYTES", DEFAULT_DAILY_BANDWIDTH),
            },
            outbox: OutboxConfig {
                batch_size: env_parse("OUTBOX_BATCH_SIZE", 100),
                poll_interval: Duration::from_millis(env_parse("OUTBOX_POLL_INTERVAL_MS", 500)),
                max_retries: env_parse("OUTBOX_MAX_RETRIES", 10),
                publish_timeout: Duration::from_secs(env_parse("OUTBOX_PUBLISH_TIMEOUT_SECS", 5)),
                destinations: DestinationUrls::from_env(),
            },
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
