//! Application error type mapping to HTTP status codes.
//!
//! Every error body has the shape `{error_kind, chat_id, message}`, with
//! `chat_id` null when the request never named a valid chat.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use entangle_types::error::{ErrorKind, TurnError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Failure reported by the orchestrator or the transcript projection.
    Turn(TurnError),
    /// Request body could not be decoded into a turn submission.
    InvalidBody(String),
    /// Missing or unknown API key.
    Unauthorized(String),
    /// Authenticated principal may not act as the requested sender.
    Forbidden(String),
}

impl From<TurnError> for AppError {
    fn from(e: TurnError) -> Self {
        AppError::Turn(e)
    }
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Turn(e) => status_for_kind(e.kind()),
            AppError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        }
    }

    fn error_kind(&self) -> String {
        match self {
            AppError::Turn(e) => e.kind().to_string(),
            AppError::InvalidBody(_) => ErrorKind::InvalidInput.to_string(),
            AppError::Unauthorized(_) => "unauthorized".to_string(),
            AppError::Forbidden(_) => "forbidden".to_string(),
        }
    }
}

fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UpstreamUnavailable | ErrorKind::UpstreamRejected => StatusCode::BAD_GATEWAY,
        ErrorKind::UpstreamTimeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::StoreUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::ReplyLost => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (chat_id, message) = match &self {
            AppError::Turn(e) => (e.chat_id().map(|id| id.to_string()), e.to_string()),
            AppError::InvalidBody(msg) | AppError::Unauthorized(msg) | AppError::Forbidden(msg) => {
                (None, msg.clone())
            }
        };

        if status.is_server_error() {
            tracing::warn!(status = status.as_u16(), chat_id = ?chat_id, "{message}");
        }

        let body = json!({
            "error_kind": self.error_kind(),
            "chat_id": chat_id,
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}
