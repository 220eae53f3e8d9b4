//! Prometheus metrics for server health.
//!
//! Exposed on a dedicated listener in Prometheus text format.

#![allow(dead_code)]

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Install the exporter; metrics appear at `http://<addr>/metrics`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("failed to install Prometheus exporter: {e}"))
}

pub fn websocket_connections_total() {
    metrics::counter!("websocket_connections_total").increment(1);
}

pub fn websocket_messages_received() {
    metrics::counter!("websocket_messages_received").increment(1);
}

pub fn auth_attempts_total(success: bool) {
    metrics::counter!("auth_attempts_total", "success" => success.to_string()).increment(1);
}

pub fn active_tables(count: usize) {
    metrics::gauge!("active_tables").set(count as f64);
}

pub fn active_sessions(count: usize) {
    metrics::gauge!("active_sessions").set(count as f64);
}
