//! Gallery counters. Request metrics come from the shared middleware.

use actix_middleware::register_counter_vec;
use once_cell::sync::Lazy;
use prometheus::IntCounterVec;

pub use actix_middleware::{serve_metrics, MetricsMiddleware};

static VIDEO_BYTES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_counter_vec(
        "gallery_service_video_bytes_total",
        "Video bytes uploaded into or deleted from galleries",
        &["change"],
    )
});

pub fn record_upload(size: u64) {
    VIDEO_BYTES_TOTAL.with_label_values(&["uploaded"]).inc_by(size);
}

pub fn record_delete(size: u64) {
    VIDEO_BYTES_TOTAL.with_label_values(&["deleted"]).inc_by(size);
}
