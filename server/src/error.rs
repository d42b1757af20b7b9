//! API error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ratewatch_common::UnsupportedReference;
use thiserror::Error;

/// Errors surfaced to HTTP clients. Upstream failures never reach this type;
/// they degrade to empty data inside the rates services.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    UnsupportedReference(#[from] UnsupportedReference),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            ApiError::UnsupportedReference(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
