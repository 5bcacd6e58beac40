use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;
use thiserror::Error;

use crate::flags::flag_models::{FlagKind, FlagName};
use crate::remote::RemoteError;
use crate::sync::SyncError;

/// Structured error body returned by the HTTP API
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    #[serde(rename = "type")]
    pub error_type: String,
    pub code: String,
    pub detail: String,
}

#[derive(Error, Debug)]
pub enum FlagError {
    #[error("Unknown flag: {0}")]
    UnknownFlag(String),
    #[error("Flag {flag} expects a {expected} value")]
    TypeMismatch { flag: FlagName, expected: FlagKind },
    #[error("Percentage must be between 0 and 100, got {0}")]
    InvalidPercentage(i64),
    #[error("Variant {variant} is not valid for {flag}")]
    InvalidVariant { flag: FlagName, variant: String },
    #[error("Flag {0} is not an A/B test")]
    NotAnAbTest(FlagName),
    #[error("Flag set is missing {0}")]
    IncompleteFlagSet(FlagName),
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
    #[error("failed to parse request: {0}")]
    RequestParsingError(#[from] serde_json::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

impl FlagError {
    /// Returns (error_type, error_code, status_code) for this error.
    fn error_metadata(&self) -> (&'static str, &'static str, StatusCode) {
        match self {
            FlagError::UnknownFlag(_) => ("not_found", "unknown_flag", StatusCode::NOT_FOUND),
            FlagError::TypeMismatch { .. } => {
                ("validation_error", "type_mismatch", StatusCode::BAD_REQUEST)
            }
            FlagError::InvalidPercentage(_) => (
                "validation_error",
                "invalid_percentage",
                StatusCode::BAD_REQUEST,
            ),
            FlagError::InvalidVariant { .. } => {
                ("validation_error", "invalid_variant", StatusCode::BAD_REQUEST)
            }
            FlagError::NotAnAbTest(_) => {
                ("validation_error", "not_an_ab_test", StatusCode::BAD_REQUEST)
            }
            FlagError::InvalidPayload(_) | FlagError::RequestParsingError(_) => {
                ("validation_error", "invalid_payload", StatusCode::BAD_REQUEST)
            }
            FlagError::IncompleteFlagSet(_) => (
                "server_error",
                "incomplete_flag_set",
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            FlagError::Remote(RemoteError::Timeout) => (
                "server_error",
                "remote_timeout",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            FlagError::Remote(_) => (
                "server_error",
                "remote_unavailable",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            FlagError::Sync(SyncError::Remote(RemoteError::NotFound)) => {
                ("not_found", "remote_record_missing", StatusCode::NOT_FOUND)
            }
            FlagError::Sync(SyncError::Remote(RemoteError::Timeout)) => (
                "server_error",
                "remote_timeout",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            FlagError::Sync(SyncError::Remote(_)) => (
                "server_error",
                "remote_unavailable",
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            FlagError::Sync(SyncError::MalformedPayload(_)) => (
                "server_error",
                "malformed_remote_payload",
                StatusCode::BAD_GATEWAY,
            ),
            FlagError::Sync(SyncError::Superseded) => {
                ("conflict", "sync_superseded", StatusCode::CONFLICT)
            }
        }
    }
}

impl IntoResponse for FlagError {
    fn into_response(self) -> Response {
        let (error_type, code, status) = self.error_metadata();
        if status.is_server_error() {
            tracing::error!(code, "request failed: {}", self);
        } else {
            tracing::debug!(code, "request rejected: {}", self);
        }

        let body = ErrorResponse {
            error_type: error_type.to_string(),
            code: code.to_string(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
