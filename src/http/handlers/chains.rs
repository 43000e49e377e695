//! On-chain wallet endpoints.
//!
//! Private keys arrive in request bodies and are handed straight to the chain
//! provider; they are never stored or logged.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::blockchain::{NetworkOption, TxHistoryEntry, WalletKeys};
use crate::http::handlers::{ApiJson, ApiPath};
use crate::http::{ApiError, ApiResult, AppState};

pub async fn list_networks(State(state): State<AppState>) -> Json<Vec<NetworkOption>> {
    Json(state.chains.network_options())
}

pub async fn create_wallet(
    State(state): State<AppState>,
    ApiPath(network): ApiPath<String>,
) -> ApiResult<(StatusCode, Json<WalletKeys>)> {
    let chain = state.chains.resolve(&network)?;
    let keys = chain.create_wallet();
    tracing::info!(network = %chain.network(), address = %keys.address, "Wallet created");
    Ok((StatusCode::CREATED, Json(keys)))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportRequest {
    pub private_key: String,
}

pub async fn import_wallet(
    State(state): State<AppState>,
    ApiPath(network): ApiPath<String>,
    ApiJson(request): ApiJson<ImportRequest>,
) -> ApiResult<Json<WalletKeys>> {
    let chain = state.chains.resolve(&network)?;
    let keys = chain.import_wallet(&request.private_key)?;
    Ok(Json(keys))
}

#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub address: String,
    pub balance: f64,
    pub symbol: &'static str,
}

pub async fn balance(
    State(state): State<AppState>,
    ApiPath((network, address)): ApiPath<(String, String)>,
) -> ApiResult<Json<BalanceResponse>> {
    let chain = state.chains.resolve(&network)?;
    let balance = chain.get_balance(&address).await;
    Ok(Json(BalanceResponse {
        symbol: chain.network().coin_symbol(),
        address,
        balance,
    }))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub private_key: String,
    pub to_address: String,
    pub amount: f64,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub hash: String,
}

pub async fn send(
    State(state): State<AppState>,
    ApiPath(network): ApiPath<String>,
    ApiJson(request): ApiJson<SendRequest>,
) -> ApiResult<Json<SendResponse>> {
    let chain = state.chains.resolve(&network)?;
    if !request.amount.is_finite() || request.amount <= 0.0 {
        return Err(ApiError::BadRequest("Amount must be greater than zero".to_string()));
    }
    if !chain.validate_address(&request.to_address) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {} address",
            chain.network().name()
        )));
    }

    let hash = chain
        .send_transaction(&request.private_key, &request.to_address, request.amount)
        .await?;
    tracing::info!(network = %chain.network(), hash = %hash, amount = request.amount, "Transfer submitted");
    Ok(Json(SendResponse { hash }))
}

#[derive(Debug, Serialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

pub async fn validate(
    State(state): State<AppState>,
    ApiPath((network, address)): ApiPath<(String, String)>,
) -> ApiResult<Json<ValidateResponse>> {
    let chain = state.chains.resolve(&network)?;
    Ok(Json(ValidateResponse {
        valid: chain.validate_address(&address),
    }))
}

pub async fn history(
    State(state): State<AppState>,
    ApiPath((network, address)): ApiPath<(String, String)>,
) -> ApiResult<Json<Vec<TxHistoryEntry>>> {
    let chain = state.chains.resolve(&network)?;
    if !chain.validate_address(&address) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {} address",
            chain.network().name()
        )));
    }
    Ok(Json(chain.transaction_history(&address).await))
}
