use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use persona_tracker::TrackerError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("profile not found: {0}")]
    NotFound(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("validation failed")]
    Validation { details: Vec<String> },

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("store error: {0}")]
    Store(#[from] persona_store::StoreError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AuthFailed(_) => StatusCode::UNAUTHORIZED,
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Tracker(err) => match err {
                TrackerError::NotFound(_) => StatusCode::NOT_FOUND,
                TrackerError::AlreadyExists(_) => StatusCode::CONFLICT,
                TrackerError::Contention { .. } => StatusCode::SERVICE_UNAVAILABLE,
                TrackerError::InvalidIdentity(_) | TrackerError::InvalidRequest(_) => {
                    StatusCode::BAD_REQUEST
                }
                TrackerError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Store(_) | Self::Config(_) | Self::Io(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = match &self {
            Self::Validation { details } => json!({
                "success": false,
                "error": self.to_string(),
                "details": details,
            }),
            _ => json!({ "success": false, "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

pub type ServerResult<T> = Result<T, ServerError>;
