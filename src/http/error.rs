//! Error type returned by every handler.
//!
//! Bodies are `{ "message": "..." }`. Internal failures are logged with their
//! cause and reported with a generic message.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::achievements::AchievementError;
use crate::auth::AuthError;
use crate::blockchain::BlockchainError;
use crate::ledger::LedgerError;
use crate::market::MarketError;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    RateLimited(String),

    /// A third-party service (market API, chain node) failed.
    #[error("{0}")]
    Upstream(String),

    #[error("{0}")]
    Unavailable(String),

    #[error("{0}")]
    Internal(String),

    /// Market refresh failure; carries the cause for the client.
    #[error("Failed to refresh market data")]
    RefreshFailed(String),
}

impl ApiError {
    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) | ApiError::RefreshFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Internal(cause) => {
                tracing::error!(error = %cause, "Request failed");
                json!({ "message": "Internal server error" })
            }
            ApiError::RefreshFailed(cause) => {
                tracing::error!(error = %cause, "Market refresh failed");
                json!({ "message": self.to_string(), "error": cause })
            }
            other => {
                if status.is_server_error() {
                    tracing::warn!(status = status.as_u16(), error = %other, "Request failed");
                }
                json!({ "message": other.to_string() })
            }
        };
        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => ApiError::not_found(&what),
            StorageError::Conflict(message) => ApiError::BadRequest(message),
            e @ StorageError::InsufficientBalance { .. } => ApiError::BadRequest(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Invalid(message) => ApiError::BadRequest(message),
            LedgerError::NotFound(what) => ApiError::not_found(&what),
            LedgerError::Storage(e) => e.into(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Invalid(message) => ApiError::BadRequest(message),
            e @ (AuthError::InvalidCredentials | AuthError::Unauthorized) => ApiError::Unauthorized(e.to_string()),
            AuthError::Hashing(message) => ApiError::Internal(message),
            AuthError::Storage(e) => e.into(),
        }
    }
}

impl From<AchievementError> for ApiError {
    fn from(err: AchievementError) -> Self {
        match err {
            e @ (AchievementError::UnknownAchievement | AchievementError::UnknownUser) => {
                ApiError::NotFound(e.to_string())
            }
            e @ AchievementError::NotManual => ApiError::Conflict(e.to_string()),
            AchievementError::Storage(e) => e.into(),
        }
    }
}

impl From<MarketError> for ApiError {
    fn from(err: MarketError) -> Self {
        match err {
            e @ MarketError::RateLimited => ApiError::RateLimited(e.to_string()),
            e @ MarketError::NotFound(_) => ApiError::NotFound(e.to_string()),
            e @ MarketError::MissingApiKey => ApiError::Unavailable(e.to_string()),
            MarketError::Storage(e) => e.into(),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}

impl From<BlockchainError> for ApiError {
    fn from(err: BlockchainError) -> Self {
        match err {
            e @ (BlockchainError::InvalidPrivateKey
            | BlockchainError::InvalidAddress(_)
            | BlockchainError::InvalidAmount(_)
            | BlockchainError::UnsupportedNetwork(_)) => ApiError::BadRequest(e.to_string()),
            e @ BlockchainError::NotAvailable(_) => ApiError::NotFound(e.to_string()),
            other => ApiError::Upstream(other.to_string()),
        }
    }
}
