use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Request-scoped error surfaced to the caller as an OpenAI-style error
/// envelope.
#[derive(Debug, Clone)]
pub struct AppError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub error_type: String,
}

impl AppError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            error_type: "invalid_request_error".to_string(),
        }
    }

    /// Missing backend credential. Checked before any backend call is made.
    pub fn backend_key_missing() -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "backend_key_missing",
            "backend API key is not configured",
        )
        .with_type("configuration_error")
    }

    /// The backend answered 2xx but the body does not match its own contract.
    pub fn backend_contract(detail: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "backend_contract", detail).with_type("upstream_error")
    }

    pub fn with_type(mut self, error_type: impl Into<String>) -> Self {
        self.error_type = error_type.into();
        self
    }
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(rename = "type")]
    error_type: String,
    code: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            error: ErrorBody {
                message: self.message,
                error_type: self.error_type,
                code: self.code,
            },
        };
        (self.status, axum::Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
