//! Notification and cascade counters. Request metrics come from the shared middleware.

use actix_middleware::register_counter_vec;
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;

pub use actix_middleware::{serve_metrics, MetricsMiddleware};

static NOTIFICATIONS_PUSHED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "blog_service_notifications_pushed_total",
        "Real-time notification pushes by event and outcome",
        &["event", "outcome"],
    )
});

static CASCADE_RUNS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "blog_service_cascade_runs_total",
        "Cascading deletes by saga and result",
        &["saga", "result"],
    )
});

pub fn record_push(event: &str, delivered: bool) {
    let outcome = if delivered { "delivered" } else { "failed" };
    NOTIFICATIONS_PUSHED_TOTAL
        .with_label_values(&[event, outcome])
        .inc();
}

pub fn record_cascade(saga: &str, succeeded: bool) {
    let result = if succeeded { "success" } else { "failure" };
    CASCADE_RUNS_TOTAL.with_label_values(&[saga, result]).inc();
}
