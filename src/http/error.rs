//! Error responses for the public routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::warn;

use crate::upstream::UpstreamError;

/// Per-field validation messages, keyed by query parameter name.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid query: {0:?}")]
    InvalidQuery(FieldErrors),

    #[error("not found")]
    NotFound,

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn field(name: &str, message: impl Into<String>) -> Self {
        let mut errors = FieldErrors::new();
        errors.insert(name.to_string(), message.into());
        ApiError::InvalidQuery(errors)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::InvalidQuery(errors) => {
                (StatusCode::BAD_REQUEST, Json(errors)).into_response()
            }
            ApiError::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
            }
            ApiError::Upstream(e) => {
                warn!(error = %e, "Upstream call failed");
                (
                    StatusCode::BAD_GATEWAY,
                    Json(json!({"error": "upstream unavailable"})),
                )
                    .into_response()
            }
            ApiError::Encode(e) => {
                warn!(error = %e, "Response encoding failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
