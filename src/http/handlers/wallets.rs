use axum::{extract::State, Json};

use crate::http::handlers::ApiPath;
use crate::http::{ApiResult, AppState};
use crate::portfolio::{self, WalletAsset};

pub async fn list_wallets(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> ApiResult<Json<Vec<WalletAsset>>> {
    Ok(Json(portfolio::load_wallet_assets(state.storage.as_ref(), user_id).await?))
}
