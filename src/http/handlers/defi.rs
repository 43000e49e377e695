use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;

use crate::http::handlers::users::require_user;
use crate::http::handlers::{ApiJson, ApiPath};
use crate::http::{ApiError, ApiResult, AppState};
use crate::storage::{DefiPosition, DefiPositionStatus, DefiPositionType, NewDefiPosition};

pub async fn list_positions(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> ApiResult<Json<Vec<DefiPosition>>> {
    require_user(state.storage.as_ref(), user_id).await?;
    Ok(Json(state.storage.defi_positions(user_id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPositionRequest {
    pub protocol: String,
    #[serde(rename = "type")]
    pub kind: DefiPositionType,
    pub amount: f64,
    pub asset_id: i32,
    #[serde(default)]
    pub apy: Option<f64>,
}

pub async fn open_position(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
    ApiJson(request): ApiJson<OpenPositionRequest>,
) -> ApiResult<(StatusCode, Json<DefiPosition>)> {
    require_user(state.storage.as_ref(), user_id).await?;

    if request.protocol.trim().is_empty() {
        return Err(ApiError::BadRequest("Protocol is required".to_string()));
    }
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest("Amount must be greater than zero".to_string()));
    }
    if matches!(request.apy, Some(apy) if !apy.is_finite() || apy < 0.0) {
        return Err(ApiError::BadRequest("APY must not be negative".to_string()));
    }
    if state.storage.get_asset(request.asset_id).await?.is_none() {
        return Err(ApiError::not_found("Asset"));
    }

    let position = state
        .storage
        .create_defi_position(NewDefiPosition {
            user_id,
            protocol: request.protocol.trim().to_string(),
            kind: request.kind,
            amount: request.amount,
            asset_id: request.asset_id,
            apy: request.apy,
        })
        .await?;
    tracing::info!(user_id, position_id = position.id, protocol = %position.protocol, "DeFi position opened");
    Ok((StatusCode::CREATED, Json(position)))
}

pub async fn withdraw(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<DefiPosition>> {
    let position = state
        .storage
        .set_defi_status(id, DefiPositionStatus::Withdrawn)
        .await?;
    tracing::info!(position_id = id, "DeFi position withdrawn");
    Ok(Json(position))
}
