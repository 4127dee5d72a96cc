//! Metrics collection and exposition.
//!
//! # Metrics
//! - `httpwire_connections_total` (counter): accepted connections
//! - `httpwire_accept_errors_total` (counter): failed accepts
//! - `httpwire_active_connections` (gauge): connections being handled
//! - `httpwire_requests_total` (counter): parsed requests by method
//! - `httpwire_request_errors_total` (counter): parse failures by kind
//! - `httpwire_handler_errors_total` (counter): handler failures
//!
//! Recording is a no-op until a recorder is installed, so the library can be
//! used without the Prometheus endpoint.

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::http::request::Method;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_connection_accepted() {
    ::metrics::counter!("httpwire_connections_total").increment(1);
}

pub fn record_accept_error() {
    ::metrics::counter!("httpwire_accept_errors_total").increment(1);
}

pub fn record_active_connections(count: u64) {
    ::metrics::gauge!("httpwire_active_connections").set(count as f64);
}

pub fn record_request(method: Method) {
    ::metrics::counter!("httpwire_requests_total", "method" => method.as_str()).increment(1);
}

pub fn record_request_error(kind: &'static str) {
    ::metrics::counter!("httpwire_request_errors_total", "kind" => kind).increment(1);
}

pub fn record_handler_error() {
    ::metrics::counter!("httpwire_handler_errors_total").increment(1);
}
