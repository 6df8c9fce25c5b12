//! HTTP error envelope (§6 "Error envelope"): every non-2xx response is
//! `{detail: string}`. Grounded in `serve::response::send_response`'s
//! single-shape error response, adapted from a WS `ServerResponse::Error`
//! payload to an axum `IntoResponse`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use orc_core::error::{ChatError, DispatcherError, HistoryError, ToolInvokeError};

#[derive(Serialize)]
struct ErrorBody {
    detail: String,
}

/// Wraps any failure surfaced by a handler with the status code it maps to.
pub struct ApiError {
    status: StatusCode,
    detail: String,
}

impl ApiError {
    pub fn new(status: StatusCode, detail: impl Into<String>) -> Self {
        Self {
            status,
            detail: detail.into(),
        }
    }

    pub fn not_found(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, detail)
    }

    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { detail: self.detail })).into_response()
    }
}

impl From<DispatcherError> for ApiError {
    fn from(e: DispatcherError) -> Self {
        match e {
            DispatcherError::JobNotFound(_) => ApiError::not_found(e.to_string()),
            DispatcherError::UnknownTests(_) | DispatcherError::DiscoveryUnavailable(_) => {
                ApiError::bad_request(e.to_string())
            }
        }
    }
}

impl From<HistoryError> for ApiError {
    fn from(e: HistoryError) -> Self {
        match e {
            HistoryError::IndexOutOfRange { .. } => ApiError::not_found(e.to_string()),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

impl From<ToolInvokeError> for ApiError {
    fn from(e: ToolInvokeError) -> Self {
        match e {
            ToolInvokeError::UnknownTool(_) => ApiError::not_found(e.to_string()),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::ConversationNotFound(_) => ApiError::not_found(e.to_string()),
            ChatError::ConcurrentSend(_) => ApiError::new(StatusCode::CONFLICT, e.to_string()),
            ChatError::Agent(_) => ApiError::new(StatusCode::BAD_GATEWAY, e.to_string()),
        }
    }
}
