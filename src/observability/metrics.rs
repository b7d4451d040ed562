//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by kind, status
//! - `gateway_request_duration_seconds` (histogram): latency by kind
//! - `gateway_host_lookups_total` (counter): existence cache outcomes
//! - `gateway_cache_refresh_total` (counter): pull-cache refresh results
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter on `addr`.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record a finished request. `kind` is `static`, `http_proxy`, `ws_proxy` or `redirect`.
pub fn record_request(kind: &'static str, status: u16, started: Instant) {
    metrics::counter!("gateway_requests_total", "kind" => kind, "status" => status.to_string()).increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "kind" => kind).record(started.elapsed().as_secs_f64());
}

/// Record how a hostname was resolved.
pub fn record_host_lookup(outcome: &'static str) {
    metrics::counter!("gateway_host_lookups_total", "outcome" => outcome).increment(1);
}

/// Record one pull-cache entry refresh.
pub fn record_cache_refresh(success: bool) {
    let result = if success { "ok" } else { "error" };
    metrics::counter!("gateway_cache_refresh_total", "result" => result).increment(1);
}
