use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::{error, warn};

use crate::engine::SyncError;

/// Error returned by a function endpoint, rendered as `{"error": ...}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Sync(SyncError::NotFound(_)) => StatusCode::NOT_FOUND,
            Self::Sync(SyncError::MissingCredential(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Sync(SyncError::Relay(_)) => StatusCode::BAD_GATEWAY,
            Self::Sync(SyncError::Database(_)) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.to_string();

        let body = match &self {
            Self::Sync(SyncError::Relay(relay)) => {
                warn!(error = %message, "Relay call failed");
                json!({ "error": message, "relay_response": relay.response_body() })
            }
            Self::Sync(SyncError::Database(_)) => {
                error!(error = %message, "Database error");
                json!({ "error": message })
            }
            _ => json!({ "error": message }),
        };

        (status, Json(body)).into_response()
    }
}
