use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::{self, Credentials};
use crate::blockchain::{solana, wallet, Network};
use crate::http::handlers::{ApiJson, ApiPath};
use crate::http::{ApiError, ApiResult, AppState};
use crate::storage::{NewWalletAddress, Storage, User, WalletAddress};

/// Public view of an account. The password hash never leaves storage.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: i32,
    pub username: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

pub(crate) async fn require_user(storage: &dyn Storage, id: i32) -> ApiResult<User> {
    storage
        .get_user(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User"))
}

pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = auth::register(state.storage.as_ref(), credentials).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<UserView>> {
    let user = require_user(state.storage.as_ref(), id).await?;
    Ok(Json(user.into()))
}

pub async fn list_addresses(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
) -> ApiResult<Json<Vec<WalletAddress>>> {
    require_user(state.storage.as_ref(), id).await?;
    Ok(Json(state.storage.wallet_addresses(id).await?))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAddressRequest {
    pub address: String,
    pub network: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Address format check for a network, independent of whether the network
/// is enabled for on-chain calls.
pub fn address_is_valid(network: Network, address: &str) -> bool {
    if network.is_evm() {
        wallet::validate_address(address)
    } else {
        solana::validate_address(address)
    }
}

pub async fn add_address(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i32>,
    ApiJson(request): ApiJson<AddAddressRequest>,
) -> ApiResult<(StatusCode, Json<WalletAddress>)> {
    require_user(state.storage.as_ref(), id).await?;

    let network: Network = request.network.parse()?;
    let address = request.address.trim();
    if !address_is_valid(network, address) {
        return Err(ApiError::BadRequest(format!(
            "Invalid {} address",
            network.name()
        )));
    }

    let stored = state
        .storage
        .add_wallet_address(NewWalletAddress {
            user_id: id,
            address: address.to_string(),
            network: network.storage_name().to_string(),
            is_active: request.is_active,
        })
        .await?;
    tracing::info!(user_id = id, network = %network, "Wallet address added");
    Ok((StatusCode::CREATED, Json(stored)))
}
