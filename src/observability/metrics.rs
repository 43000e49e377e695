//! Metrics collection and exposition.
//!
//! # Metrics
//! - `wallet_requests_total` (counter): requests by method, route, status
//! - `wallet_request_duration_seconds` (histogram): latency by method, route
//! - `wallet_rate_limited_total` (counter): rejected requests by reason
//! - `wallet_chain_rpc_total` (counter): node calls by network, method, outcome
//! - `wallet_market_refresh_total` (counter): refresh runs by outcome
//! - `wallet_market_fallback_total` (counter): answers served from fallback prices
//! - `wallet_ledger_transactions_total` (counter): recorded transactions by type
//!
//! Without an installed recorder every call here is a no-op.

use axum::{
    body::Body,
    extract::MatchedPath,
    http::Request,
    middleware::Next,
    response::Response,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::time::Instant;

/// Install the Prometheus recorder and its HTTP listener on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, route: &str, status: u16, start: Instant) {
    counter!(
        "wallet_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "wallet_request_duration_seconds",
        "method" => method.to_string(),
        "route" => route.to_string()
    )
    .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(reason: &'static str) {
    counter!("wallet_rate_limited_total", "reason" => reason).increment(1);
}

pub fn record_chain_rpc(network: &'static str, method: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("wallet_chain_rpc_total", "network" => network, "method" => method, "outcome" => outcome)
        .increment(1);
}

pub fn record_market_refresh(outcome: &'static str) {
    counter!("wallet_market_refresh_total", "outcome" => outcome).increment(1);
}

/// Market calls answered from the built-in price table.
pub fn record_market_fallback() {
    counter!("wallet_market_fallback_total").increment(1);
}

pub fn record_ledger_transaction(kind: &'static str) {
    counter!("wallet_ledger_transactions_total", "type" => kind).increment(1);
}

/// Per-request counter and latency. Routes are labelled by their pattern
/// (`/api/wallets/{user_id}`) to keep cardinality bounded.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    record_request(&method, &route, response.status().as_u16(), start);
    response
}
