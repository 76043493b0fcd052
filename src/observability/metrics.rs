//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define gateway metrics (requests, latency, breaker state, fallbacks)
//! - Expose Prometheus-compatible metrics endpoint
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by service, method, status
//! - `gateway_request_duration_seconds` (histogram): latency by service
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_circuit_rejections_total` (counter): calls refused by an open breaker
//! - `gateway_aggregation_fallbacks_total` (counter): dependencies served from fallback
//! - `gateway_service_health` (gauge): 1=healthy, 0=unhealthy

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::time::Instant;

use crate::resilience::CircuitState;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request to a backend service (or `gateway` for local routes).
pub fn record_request(service: &str, method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "service" => service.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!("gateway_request_duration_seconds", "service" => service.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_circuit_state(service: &str, state: CircuitState) {
    gauge!("gateway_circuit_state", "service" => service.to_string()).set(state.as_gauge());
}

pub fn record_circuit_rejection(service: &str) {
    counter!("gateway_circuit_rejections_total", "service" => service.to_string()).increment(1);
}

pub fn record_aggregation_fallback(dependency: &str) {
    counter!("gateway_aggregation_fallbacks_total", "dependency" => dependency.to_string())
        .increment(1);
}

pub fn record_service_health(service: &str, healthy: bool) {
    gauge!("gateway_service_health", "service" => service.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}
