//! Actix middleware shared by the Inkwell HTTP services.
//!
//! - `metrics`: per-route request counters and latency, plus the `/metrics` scrape handler

pub mod metrics;

pub use metrics::{register_counter_vec, serve_metrics, MetricsMiddleware};
