//! Metrics collection and exposition.
//!
//! # Metrics
//! - `ingress_connections_accepted_total` (counter)
//! - `ingress_open_connections` (gauge): current table size
//! - `ingress_requests_emitted_total` (counter): Request messages sent downstream
//! - `ingress_responses_sent_total` (counter): responses written, by status
//! - `ingress_responses_dropped_total` (counter): unroutable responses, by reason
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;

use ::metrics::{counter, gauge};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its HTTP scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    counter!("ingress_connections_accepted_total").increment(1);
}

pub fn connection_opened() {
    gauge!("ingress_open_connections").increment(1.0);
}

pub fn connection_closed() {
    gauge!("ingress_open_connections").decrement(1.0);
}

pub fn record_request_emitted(method: &str) {
    counter!("ingress_requests_emitted_total", "method" => method.to_string()).increment(1);
}

pub fn record_response_sent(status: u16) {
    counter!("ingress_responses_sent_total", "status" => status.to_string()).increment(1);
}

pub fn record_response_dropped(reason: &'static str) {
    counter!("ingress_responses_dropped_total", "reason" => reason).increment(1);
}
