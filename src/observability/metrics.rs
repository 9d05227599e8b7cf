//! Metrics collection and exposition.
//!
//! # Metrics
//! - `agent_requests_total` (counter): requests by kind and outcome
//! - `agent_request_duration_seconds` (histogram): handler latency by kind
//! - `agent_active_connections` (gauge): open client connections
//! - `agent_identity_cache_handles` (gauge): live handles
//! - `agent_dispatch_promotions_total` (counter): type-map promotions
//! - `agent_push_messages_total` (counter): pushed messages by kind
//! - `agent_push_pings_total` (counter): keepalive pings written
//!
//! Recording is a no-op until `init_metrics` installs an exporter.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Serve Prometheus metrics on `addr`. Must be called inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(kind: &'static str, outcome: &'static str, start: Instant) {
    counter!("agent_requests_total", "kind" => kind, "outcome" => outcome).increment(1);
    histogram!("agent_request_duration_seconds", "kind" => kind)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_active_connections(count: usize) {
    gauge!("agent_active_connections").set(count as f64);
}

pub fn record_identity_cache_size(handles: usize) {
    gauge!("agent_identity_cache_handles").set(handles as f64);
}

pub fn record_dispatch_promotion() {
    counter!("agent_dispatch_promotions_total").increment(1);
}

pub fn record_push_message(kind: &'static str) {
    counter!("agent_push_messages_total", "kind" => kind).increment(1);
}

pub fn record_push_ping() {
    counter!("agent_push_pings_total").increment(1);
}
