use axum::{extract::State, Json};
use serde::Deserialize;

use crate::achievements::{self, Achievement, UserProgress, CATALOG};
use crate::http::handlers::users::require_user;
use crate::http::handlers::{ApiJson, ApiPath};
use crate::http::{ApiError, ApiResult, AppState};
use crate::storage::UserAchievement;

pub async fn catalog() -> Json<&'static [Achievement]> {
    Json(CATALOG)
}

pub async fn user_progress(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i32>,
) -> ApiResult<Json<UserProgress>> {
    require_user(state.storage.as_ref(), user_id).await?;
    let progress = achievements::evaluate(state.storage.as_ref(), user_id, state.launch_date).await?;
    Ok(Json(progress))
}

#[derive(Debug, Deserialize)]
pub struct ProgressRequest {
    pub progress: i64,
}

pub async fn set_progress(
    State(state): State<AppState>,
    ApiPath((user_id, achievement_id)): ApiPath<(i32, String)>,
    ApiJson(request): ApiJson<ProgressRequest>,
) -> ApiResult<Json<UserAchievement>> {
    let progress = u8::try_from(request.progress)
        .ok()
        .filter(|p| *p <= 100)
        .ok_or_else(|| ApiError::BadRequest("progress must be between 0 and 100".to_string()))?;
    let record =
        achievements::set_manual_progress(state.storage.as_ref(), user_id, &achievement_id, progress)
            .await?;
    Ok(Json(record))
}
