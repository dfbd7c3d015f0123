//! Ledger counters. Request metrics come from the shared middleware.

use actix_middleware::register_counter_vec;
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;

pub use actix_middleware::{serve_metrics, MetricsMiddleware};

static LEDGER_APPENDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "quota_service_ledger_appends_total",
        "Ledger append attempts by entry kind and outcome",
        &["kind", "outcome"],
    )
});

pub fn record_ledger_append(kind: &str, appended: bool) {
    let outcome = if appended { "appended" } else { "duplicate" };
    LEDGER_APPENDS_TOTAL.with_label_values(&[kind, outcome]).inc();
}
