use axum::{extract::State, Json};
use serde::Serialize;

use crate::http::{ApiError, ApiResult, AppState};
use crate::market::{self, MarketAsset, RefreshReport};

pub async fn list_market(State(state): State<AppState>) -> ApiResult<Json<Vec<MarketAsset>>> {
    Ok(Json(market::market_assets(state.storage.as_ref()).await?))
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub message: &'static str,
    #[serde(flatten)]
    pub report: RefreshReport,
}

pub async fn refresh(State(state): State<AppState>) -> ApiResult<Json<RefreshResponse>> {
    let report = state
        .refresher
        .refresh_once()
        .await
        .map_err(|e| ApiError::RefreshFailed(e.to_string()))?;
    Ok(Json(RefreshResponse {
        message: "Market data refreshed successfully",
        report,
    }))
}
