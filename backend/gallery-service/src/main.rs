/// Gallery Service - HTTP Server
///
/// Serves video galleries, consumes `/videos/events` and runs the outbox dispatcher that
/// delivers this service's events to the quota trackers.
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use anyhow::{anyhow, Context};
use document_store::{DocumentCollection, MemoryCollection, PgCollection, StoreBackend};
use gallery_service::config::ObjectStorageProvider;
use gallery_service::storage::{get_s3_client, InMemoryObjectStorage, ObjectStorage, S3ObjectStorage};
use gallery_service::{build_services, handlers, metrics, Config, GalleryAggregate};
use idempotent_consumer::{InMemoryProcessedEventStore, ProcessedEventStore, SqlxProcessedEventStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::metrics::OutboxMetrics;
use transactional_outbox::{
    HttpOutboxPublisher, InMemoryOutboxRepository, OutboxProcessor, OutboxRepository,
    SqlxOutboxRepository,
};

type Collaborators = (
    Arc<dyn DocumentCollection<GalleryAggregate>>,
    Arc<dyn OutboxRepository>,
    Arc<dyn ProcessedEventStore>,
);

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,actix_web=info".into());
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);
    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_target(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

async fn connect_store(backend: StoreBackend) -> anyhow::Result<Collaborators> {
    match backend {
        StoreBackend::Memory => {
            warn!("Using in-memory document store; data is lost on restart");
            let galleries: Arc<dyn DocumentCollection<GalleryAggregate>> =
                Arc::new(MemoryCollection::new());
            let outbox: Arc<dyn OutboxRepository> = Arc::new(InMemoryOutboxRepository::new());
            let processed: Arc<dyn ProcessedEventStore> =
                Arc::new(InMemoryProcessedEventStore::new());
            Ok((galleries, outbox, processed))
        }
        StoreBackend::Postgres => {
            let db_config = db_pool::DbConfig::from_env("gallery-service").map_err(|e| anyhow!(e))?;
            db_config.log_config();
            let pool = db_pool::create_pool_with_retry(db_config)
                .await
                .context("Failed to connect to PostgreSQL")?;

            document_store::ensure_schema(&pool)
                .await
                .context("Failed to prepare document store schema")?;
            let outbox = SqlxOutboxRepository::new(pool.clone());
            outbox
                .ensure_schema()
                .await
                .context("Failed to prepare outbox schema")?;
            let processed = SqlxProcessedEventStore::new(pool.clone());
            processed
                .ensure_schema()
                .await
                .context("Failed to prepare processed events schema")?;

            let galleries: Arc<dyn DocumentCollection<GalleryAggregate>> =
                Arc::new(PgCollection::new(pool));
            Ok((galleries, Arc::new(outbox), Arc::new(processed)))
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = Config::from_env().map_err(|e| anyhow!("Failed to load configuration: {}", e))?;
    info!(
        env = %config.app.env,
        store = ?config.store,
        object_storage = ?config.object_storage.provider,
        "Starting gallery-service"
    );

    let (galleries, outbox, processed_events) = connect_store(config.store).await?;

    let object_storage: Arc<dyn ObjectStorage> = match config.object_storage.provider {
        ObjectStorageProvider::Memory => Arc::new(InMemoryObjectStorage::new()),
        ObjectStorageProvider::S3 => {
            let client = get_s3_client(&config.object_storage).await;
            Arc::new(S3ObjectStorage::new(client, &config.object_storage))
        }
    };

    let (gallery, consumer) = build_services(
        galleries,
        object_storage,
        outbox.clone(),
        processed_events,
        config.quota,
    );

    let publisher = Arc::new(
        HttpOutboxPublisher::new(
            config.outbox.destinations.clone(),
            config.outbox.publish_timeout,
        )
        .context("Failed to build outbox publisher")?,
    );
    let mut processor = OutboxProcessor::new(
        outbox,
        publisher,
        config.outbox.batch_size,
        config.outbox.poll_interval,
        config.outbox.max_retries,
    );
    match OutboxMetrics::new("gallery-service") {
        Ok(outbox_metrics) => processor = processor.with_metrics(outbox_metrics),
        Err(e) => warn!(error = %e, "Outbox metrics unavailable"),
    }
    tokio::spawn(async move {
        if let Err(e) = processor.start().await {
            error!(error = %e, "Outbox processor stopped");
        }
    });

    consumer.guard().spawn_cleanup(Duration::from_secs(3600));

    let bind_address = (config.app.host.clone(), config.app.port);
    info!(host = %bind_address.0, port = bind_address.1, "Starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(gallery.clone()))
            .app_data(web::Data::new(consumer.clone()))
            .wrap(metrics::MetricsMiddleware::new("gallery-service"))
            .wrap(actix_middleware::Logger::default())
            .configure(handlers::register_routes)
    })
    .bind(bind_address)?
    .run()
    .await?;

    info!("Gallery-service shutting down");
    Ok(())
}
