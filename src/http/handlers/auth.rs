//! Session endpoints and the [`CurrentUser`] extractor.

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::{self, bearer_token, AuthError, Credentials};
use crate::http::handlers::users::UserView;
use crate::http::handlers::ApiJson;
use crate::http::{ApiError, ApiResult, AppState};
use crate::storage::User;

/// The user owning the request's bearer token.
pub struct CurrentUser(pub User);

fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(bearer_token)
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || ApiError::from(AuthError::Unauthorized);
        let token = session_token(&parts.headers).ok_or_else(unauthorized)?;
        let user_id = state.sessions.resolve(token).ok_or_else(unauthorized)?;
        // the account may have disappeared with a storage reset
        let user = state.storage.get_user(user_id).await?.ok_or_else(unauthorized)?;
        Ok(CurrentUser(user))
    }
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: UserView,
    pub token: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

pub async fn register(
    State(state): State<AppState>,
    ApiJson(credentials): ApiJson<Credentials>,
) -> ApiResult<(StatusCode, Json<SessionResponse>)> {
    let user = auth::register(state.storage.as_ref(), credentials).await?;
    let token = state.sessions.create(user.id);
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            user: user.into(),
            token,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let user = auth::login(state.storage.as_ref(), &request.username, &request.password).await?;
    let token = state.sessions.create(user.id);
    tracing::info!(user_id = user.id, "User logged in");
    Ok(Json(SessionResponse {
        user: user.into(),
        token,
    }))
}

/// Always succeeds; an unknown or missing token is already logged out.
pub async fn logout(State(state): State<AppState>, headers: HeaderMap) -> StatusCode {
    if let Some(token) = session_token(&headers) {
        if state.sessions.revoke(token) {
            tracing::debug!("Session revoked");
        }
    }
    StatusCode::OK
}

pub async fn current_user(CurrentUser(user): CurrentUser) -> Json<UserView> {
    Json(user.into())
}
