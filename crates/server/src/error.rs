use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use services::services::{
    github::{client::GitHubApiError, inbound::WebhookSyncError, signature::SignatureError},
    token_vault::CryptoError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Signature(#[from] SignatureError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error(transparent)]
    GitHub(#[from] GitHubApiError),
    #[error(transparent)]
    WebhookSync(#[from] WebhookSyncError),
    #[error("{0}")]
    BadRequest(String),
    #[error("resource not found")]
    NotFound,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Database(sqlx::Error::RowNotFound) | ApiError::NotFound => {
                StatusCode::NOT_FOUND
            }
            ApiError::Signature(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) | ApiError::WebhookSync(WebhookSyncError::Payload(_)) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Database(_)
            | ApiError::Crypto(_)
            | ApiError::GitHub(_)
            | ApiError::WebhookSync(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            tracing::error!("request failed: {}", self);
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
