/// Configuration management for blog-service
///
/// Loads configuration from environment variables with sensible defaults.
use crate::saga::SagaPolicy;
use document_store::StoreBackend;
use std::time::Duration;
use transactional_outbox::DestinationUrls;

#[derive(Clone, Debug)]
pub struct Config {
    pub app: AppConfig,
    pub store: StoreBackend,
    pub cascade_policy: SagaPolicy,
    pub outbox: OutboxConfig,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub env: String,
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
        let cascade_policy = match std::env::var("CASCADE_POLICY") {
            Ok(value) => value.parse()?,
            Err(_) => SagaPolicy::default(),
        };

        Ok(Config {
            app: AppConfig {
                host: std::env::var("BLOG_SERVICE_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: std::env::var("BLOG_SERVICE_PORT")
                    .unwrap_or_else(|_| "8080".to_string())
                    .parse()
                    .unwrap_or(8080),
                env: std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
            },
            store: StoreBackend::from_env()?,
            cascade_policy,
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

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_cascade_policy_from_env() {
        std::env::set_var("STORE_BACKEND", "memory");
        std::env::remove_var("CASCADE_POLICY");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cascade_policy, SagaPolicy::AbortAndCompensate);
        assert_eq!(config.app.port, 8080);

        std::env::set_var("CASCADE_POLICY", "best-effort");
        let config = Config::from_env().unwrap();
        assert_eq!(config.cascade_policy, SagaPolicy::BestEffort);

        std::env::set_var("CASCADE_POLICY", "sometimes");
        assert!(Config::from_env().is_err());

        std::env::remove_var("CASCADE_POLICY");
        std::env::remove_var("STORE_BACKEND");
    }
}
