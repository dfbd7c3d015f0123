//! PostgreSQL pools for the Inkwell services.
//!
//! Every service that runs with `STORE_BACKEND=postgres` keeps its documents, outbox records and
//! processed-event keys in one database, so pool sizes are budgeted per service.

use resilience::{with_retry_if, RetryConfig};
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("DATABASE_URL is not set")]
    MissingUrl,

    #[error("cannot connect to PostgreSQL: {0}")]
    Connect(#[from] sqlx::Error),

    #[error("PostgreSQL did not answer SELECT 1 within {0:?}")]
    Unverified(Duration),
}

impl PoolError {
    /// Errors worth waiting out while the database container starts.
    fn is_transient(&self) -> bool {
        match self {
            PoolError::MissingUrl => false,
            PoolError::Unverified(_) => true,
            PoolError::Connect(e) => matches!(
                e,
                sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed
            ),
        }
    }
}

/// Connection budget for one service.
#[derive(Clone)]
pub struct DbConfig {
    pub service_name: String,
    pub database_url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    /// Deadline for the `SELECT 1` that proves a new pool works.
    pub verify_timeout: Duration,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl fmt::Debug for DbConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbConfig")
            .field("service_name", &self.service_name)
            .field("database_url", &"[REDACTED]")
            .field("max_connections", &self.max_connections)
            .field("min_connections", &self.min_connections)
            .field("verify_timeout", &self.verify_timeout)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish_non_exhaustive()
    }
}

/// (max, min) connections. The quota service takes every callback fan-out and gets the most;
/// the sum stays under PostgreSQL's default limit of 100 with room for migrations and psql.
fn budget(service_name: &str) -> (u32, u32) {
    match service_name {
        "quota-service" => (16, 4),
        "blog-service" => (12, 4),
        "gallery-service" => (8, 2),
        _ => (2, 1),
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_secs(key: &str, default: u64) -> Duration {
    Duration::from_secs(env_or(key, default))
}

impl DbConfig {
    /// Budget for `service_name`, with `DB_*` overrides. `DATABASE_URL` is required.
    pub fn from_env(service_name: &str) -> Result<Self, PoolError> {
        let database_url = std::env::var("DATABASE_URL").map_err(|_| PoolError::MissingUrl)?;
        let (max, min) = budget(service_name);

        Ok(Self {
            service_name: service_name.to_string(),
            database_url,
            max_connections: env_or("DB_MAX_CONNECTIONS", max),
            min_connections: env_or("DB_MIN_CONNECTIONS", min),
            verify_timeout: env_secs("DB_CONNECT_TIMEOUT_SECS", 5),
            acquire_timeout: env_secs("DB_ACQUIRE_TIMEOUT_SECS", 10),
            idle_timeout: env_secs("DB_IDLE_TIMEOUT_SECS", 600),
            max_lifetime: env_secs("DB_MAX_LIFETIME_SECS", 1800),
        })
    }

    pub fn log_config(&self) {
        info!(
            service = %self.service_name,
            max_connections = self.max_connections,
            min_connections = self.min_connections,
            acquire_timeout = ?self.acquire_timeout,
            "Database pool configuration"
        );
    }
}

/// Open the pool and prove it with `SELECT 1`.
pub async fn create_pool(config: &DbConfig) -> Result<PgPool, PoolError> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .test_before_acquire(true)
        .connect(&config.database_url)
        .await?;

    tokio::time::timeout(config.verify_timeout, sqlx::query("SELECT 1").execute(&pool))
        .await
        .map_err(|_| PoolError::Unverified(config.verify_timeout))??;

    info!(service = %config.service_name, "Database pool ready");
    Ok(pool)
}

/// [`create_pool`], retried while the database is still coming up.
pub async fn create_pool_with_retry(config: DbConfig) -> Result<PgPool, PoolError> {
    with_retry_if(
        RetryConfig::startup(),
        || create_pool(&config),
        |e| {
            let transient = e.is_transient();
            if !transient {
                warn!(service = %config.service_name, error = %e, "Database error is not retryable");
            }
            transient
        },
    )
    .await
    .map_err(|e| e.into_inner())
}
