use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::services::chunker::ChunkError;
use crate::services::conversation::TurnError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Blocking notice for a turn attempted without a usable API key.
    #[error("Please add your Cohere API key to continue.")]
    MissingCredential,

    #[error("Failed to load schedule: {0}")]
    DocumentLoad(String),

    #[error("Chat service error: {0}")]
    RemoteService(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl From<ChunkError> for AppError {
    fn from(e: ChunkError) -> Self {
        AppError::DocumentLoad(e.to_string())
    }
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        match e {
            TurnError::MissingCredential => AppError::MissingCredential,
            TurnError::Remote(e) => AppError::RemoteService(e.to_string()),
        }
    }
}

#[derive(Serialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorResponse {
    error: String,
    status: u16,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::MissingCredential => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::DocumentLoad(_) => {
                tracing::error!("{self}");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            AppError::RemoteService(_) => {
                tracing::warn!("{self}");
                (StatusCode::BAD_GATEWAY, self.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = axum::Json(ErrorResponse {
            error: message,
            status: status.as_u16(),
        });

        (status, body).into_response()
    }
}
