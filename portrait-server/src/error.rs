//! API error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// API error type, rendered as `{"success": false, "message": ...}`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    /// Offending URL for download failures.
    pub url: Option<String>,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
            url: None,
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
            url: None,
        }
    }

    /// Prefix the message, keeping status and URL.
    pub fn context(mut self, prefix: &str) -> Self {
        self.message = format!("{prefix}: {}", self.message);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match self.url {
            Some(url) => json!({
                "success": false,
                "message": self.message,
                "url": url,
            }),
            None => json!({
                "success": false,
                "message": self.message,
            }),
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<portrait::Error> for ApiError {
    fn from(err: portrait::Error) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        let message = match &err {
            // the URL travels in its own field
            portrait::Error::Download { message, .. } => message.clone(),
            _ => err.to_string(),
        };
        Self {
            status,
            message,
            url: err.url().map(str::to_string),
        }
    }
}
