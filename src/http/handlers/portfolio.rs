use axum::{extract::State, Json};
use serde::Deserialize;

use crate::http::handlers::{ApiPath, ApiQuery};
use crate::http::{ApiError, ApiResult, AppState};
use crate::portfolio::{self, PortfolioSummary, DEFAULT_HISTORY_DAYS};
use crate::storage::PortfolioHistory;

pub async fn summary(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> ApiResult<Json<PortfolioSummary>> {
    Ok(Json(portfolio::load_summary(state.storage.as_ref(), user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub days: Option<i64>,
}

pub async fn history(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
    ApiQuery(query): ApiQuery<HistoryQuery>,
) -> ApiResult<Json<Vec<PortfolioHistory>>> {
    let days = query.days.unwrap_or(DEFAULT_HISTORY_DAYS);
    if !(1..=3650).contains(&days) {
        return Err(ApiError::BadRequest("days must be between 1 and 3650".to_string()));
    }
    Ok(Json(portfolio::load_history(state.storage.as_ref(), user_id, days).await?))
}
