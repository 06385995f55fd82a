//! Maps [`doccoord_kv::Error`] onto the HTTP failure shapes spec.md §6/§7
//! names, the same `thiserror` enum + `IntoResponse` shape used throughout
//! the pack's axum servers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use doccoord_kv::Error as EngineError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("invalid request body: {0}")]
    BadRequest(String),
    #[error("unknown fileId")]
    UnknownFile,
}

#[derive(Serialize)]
struct ErrorPayload {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::Engine(EngineError::StaleClient { persisted_version }) => (
                StatusCode::CONFLICT,
                format!("RESYNC_REQUIRED: client at V < persisted {persisted_version}"),
            ),
            ApiError::Engine(EngineError::RetriesExhausted { .. }) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Engine(EngineError::StoreUnavailable(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Engine(EngineError::ObjectStoreFailure(reason)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to save document: {reason}"),
            ),
            ApiError::Engine(EngineError::OtTransformFailure(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Engine(EngineError::Parse(_)) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::Engine(EngineError::Internal(_)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ApiError::Engine(EngineError::GapBefore { .. })
            | ApiError::Engine(EngineError::PendingBefore { .. })
            | ApiError::Engine(EngineError::VersionConflict { .. }) => {
                // Never meant to escape the pipeline's internal retry loop.
                tracing::error!(error = %self, "internal CAS state leaked to the HTTP boundary");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal coordination error".to_string())
            }
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ApiError::UnknownFile => (StatusCode::NOT_FOUND, self.to_string()),
        };

        (status, Json(ErrorPayload { message })).into_response()
    }
}
