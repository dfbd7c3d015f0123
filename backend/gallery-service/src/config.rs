/// Configuration management for gallery-service
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
    pub quota: QuotaDefaults,
    pub object_storage: ObjectStorageConfig,
    pub outbox: OutboxConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
}

/// Counters given to a gallery when its owner is created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QuotaDefaults {
    pub free_storage: u64,
    pub free_bandwidth: u64,
}

impl Default for QuotaDefaults {
    fn default() -> Self {
        Self {
            free_storage: DEFAULT_TOTAL_STORAGE,
            free_bandwidth: DEFAULT_DAILY_BANDWIDTH,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ObjectStorageProvider {
    Memory,
    S3,
}

#[derive(Clone, Debug)]
pub struct ObjectStorageConfig {
    pub provider: ObjectStorageProvider,
    pub bucket: String,
    pub region: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub endpoint: Option<String>,
    /// Base of the URLs handed back to clients, e.g. a CDN in front of the bucket
    pub public_base_url: Option<String>,
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
        let provider = match std::env::var("OBJECT_STORAGE")
            .unwrap_or_else(|_| "s3".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "memory" => ObjectStorageProvider::Memory,
            "s3" => ObjectStorageProvider::S3,
            other => return Err(format!("Unknown OBJECT_STORAGE: {}", other).into()),
        };

        Ok(Config {
            app: AppConfig {
                host: std::env::var("GALLERY_SERVICE_HOST")
                    .unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("GALLERY_SERVICE_PORT")
                    .unwrap_or_else(|_| "8081".to_string())
                    .parse()
                    .unwrap_or(8081),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            store: StoreBackend::from_env()?,
            quota: QuotaDefaults {
                free_storage: env_parse("GALLERY_DEFAULT_STORAGE_BYTES", DEFAULT_TOTAL_STORAGE),
                free_bandwidth: env_parse(
                    "GALLERY_DEFAULT_BANDWIDTH_BYTES",
                    DEFAULT_DAILY_BANDWIDTH,
                ),
            },
            object_storage: ObjectStorageConfig {
                provider,
                bucket: std::env::var("S3_BUCKET").unwrap_or_else(|_| "inkwell-videos".to_string()),
                region: std::env::var("AWS_REGION").unwrap_or_else(|_| "us-east-1".to_string()),
                access_key_id: std::env::var("AWS_ACCESS_KEY_ID").ok(),
                secret_access_key: std::env::var("AWS_SECRET_ACCESS_KEY").ok(),
                endpoint: std::env::var("S3_ENDPOINT").ok(),
                public_base_url: std::env::var("S3_PUBLIC_BASE_URL").ok(),
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
