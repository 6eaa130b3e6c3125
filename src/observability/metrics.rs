//! Metrics collection and exposition.
//!
//! # Metrics
//! - `pbx_sessions_total` (counter): sessions by route and outcome
//! - `pbx_active_sessions` (gauge): sessions currently being handled
//! - `pbx_chat_posts_total` (counter): chat posts by outcome
//! - `pbx_chat_pings_total` (counter): keep-alive pings by outcome
//! - `pbx_chat_reconnects_total` (counter): reconnection attempts

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_session(route: &str, outcome: &'static str) {
    counter!("pbx_sessions_total", "route" => route.to_string(), "outcome" => outcome).increment(1);
}

pub fn set_active_sessions(count: u64) {
    gauge!("pbx_active_sessions").set(count as f64);
}

pub fn record_chat_post(outcome: &'static str) {
    counter!("pbx_chat_posts_total", "outcome" => outcome).increment(1);
}

pub fn record_chat_ping(outcome: &'static str) {
    counter!("pbx_chat_pings_total", "outcome" => outcome).increment(1);
}

pub fn record_chat_reconnect() {
    counter!("pbx_chat_reconnects_total").increment(1);
}
