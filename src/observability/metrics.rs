//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): total requests by method, status
//! - `http_request_duration_seconds` (histogram): wall-clock latency
//! - `http_request_active_seconds` (histogram): time spent polling the request pipeline
//! - `http_inflight_requests` (gauge): requests currently in the pipeline
//!
//! Recording is a no-op until a recorder is installed by [`init_metrics`].

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, started_at: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(started_at.elapsed().as_secs_f64());
}

pub fn record_active_time(active: Duration) {
    histogram!("http_request_active_seconds").record(active.as_secs_f64());
}

pub fn set_inflight(count: u64) {
    gauge!("http_inflight_requests").set(count as f64);
}
