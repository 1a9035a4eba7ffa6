//! Ambient Prometheus metrics, following the same naming/registration conventions as
//! the teacher crate's metrics module, trimmed to what the routing plane emits.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use lazy_static::lazy_static;
use prometheus::{
    histogram_opts, opts, register_counter_vec, register_gauge_vec, register_histogram_vec,
    CounterVec, Encoder, GaugeVec, HistogramVec, TextEncoder,
};

lazy_static! {
    pub static ref REQUESTS_TOTAL: CounterVec = register_counter_vec!(
        opts!("chlb_requests_total", "Total number of proxied requests"),
        &["status"] // ok, no_backend, upstream_error, invalid_key
    )
    .unwrap();

    pub static ref REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        histogram_opts!(
            "chlb_request_duration_seconds",
            "End-to-end proxy request duration",
            vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0]
        ),
        &["backend"]
    )
    .unwrap();

    pub static ref BACKEND_HEALTH_STATUS: GaugeVec = register_gauge_vec!(
        opts!(
            "chlb_backend_health_status",
            "Backend health status (0=unhealthy, 1=healthy)"
        ),
        &["backend"]
    )
    .unwrap();

    pub static ref BACKEND_WEIGHT: GaugeVec = register_gauge_vec!(
        opts!("chlb_backend_weight", "Current backend weight (0-10)"),
        &["backend"]
    )
    .unwrap();

    pub static ref RING_SIZE: prometheus::IntGauge =
        prometheus::register_int_gauge!("chlb_ring_size", "Number of vnodes in the current ring").unwrap();

    pub static ref REBUILDS_TOTAL: prometheus::IntCounter =
        prometheus::register_int_counter!("chlb_rebuilds_total", "Total number of ring rebuilds").unwrap();

    pub static ref HEALTH_CHECK_TOTAL: CounterVec = register_counter_vec!(
        opts!("chlb_health_check_total", "Total number of health checks performed"),
        &["backend", "result"]
    )
    .unwrap();
}

/// `GET /metrics` handler: standard Prometheus text exposition format.
pub async fn handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("failed to encode metrics: {e}");
        return (StatusCode::INTERNAL_SERVER_ERROR, String::new());
    }
    (StatusCode::OK, String::from_utf8_lossy(&buffer).into_owned())
}
