use axum::{extract::State, Json};

use crate::http::{ApiResult, AppState};
use crate::storage::Asset;

pub async fn list_assets(State(state): State<AppState>) -> ApiResult<Json<Vec<Asset>>> {
    Ok(Json(state.storage.list_assets().await?))
}
