use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::http::AppState;
use crate::market::ApiStatus;

#[derive(Debug, Serialize)]
pub struct ChainHealth {
    pub network: &'static str,
    pub healthy: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// "ok" when storage answers, "degraded" otherwise.
    pub status: &'static str,
    pub version: &'static str,
    pub storage: bool,
    pub market: ApiStatus,
    pub chains: Vec<ChainHealth>,
    pub active_sessions: usize,
}

/// Only storage decides the status code; an unreachable market API or node
/// degrades individual features but not the service.
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let storage = match state.storage.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Storage health check failed");
            false
        }
    };

    let authenticated = state.config.market.api_key.is_some();
    let market = match state.market.status().await {
        Ok(status) => status,
        Err(e) => ApiStatus::error(state.market.name(), authenticated, e.to_string()),
    };

    let chains = state
        .chains
        .health()
        .await
        .into_iter()
        .map(|(network, healthy)| ChainHealth {
            network: network.as_str(),
            healthy,
        })
        .collect();

    let code = if storage {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (
        code,
        Json(HealthReport {
            status: if storage { "ok" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            storage,
            market,
            chains,
            active_sessions: state.sessions.len(),
        }),
    )
}
