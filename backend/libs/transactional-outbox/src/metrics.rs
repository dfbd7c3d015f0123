use prometheus::{IntCounter, IntGauge, Opts};
use tracing::warn;

#[derive(Clone)]
pub struct OutboxMetrics {
    pub pending: IntGauge,
    pub oldest_pending_age_seconds: IntGauge,
    pub published: IntCounter,
    pub failed: IntCounter,
}

impl OutboxMetrics {
    /// Create the outbox metrics and register them with the default registry.
    pub fn new(service: &str) -> prometheus::Result<Self> {
        let opts = |name: &str, help: &str| {
            Opts::new(name, help).const_label("service", service.to_string())
        };

        let pending = IntGauge::with_opts(opts(
            "outbox_pending_count",
            "Number of undelivered outbox records currently pending",
        ))?;
        let oldest_pending_age_seconds = IntGauge::with_opts(opts(
            "outbox_oldest_pending_age_seconds",
            "Age in seconds of the oldest pending outbox record",
        ))?;
        let published = IntCounter::with_opts(opts(
            "outbox_published_total",
            "Total number of outbox records delivered to their destination",
        ))?;
        let failed = IntCounter::with_opts(opts(
            "outbox_failed_attempts_total",
            "Total number of failed delivery attempts",
        ))?;

        let registry = prometheus::default_registry();
        for metric in [
            Box::new(pending.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(oldest_pending_age_seconds.clone()),
            Box::new(published.clone()),
            Box::new(failed.clone()),
        ] {
            if let Err(e) = registry.register(metric) {
                warn!("Failed to register outbox metric: {}", e);
            }
        }

        Ok(Self {
            pending,
            oldest_pending_age_seconds,
            published,
            failed,
        })
    }
}
