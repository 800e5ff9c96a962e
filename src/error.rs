//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Startup-time failures: invalid options or an unusable catalog. Fatal; the server does not start.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid option {option}: {reason}")]
    InvalidOption { option: &'static str, reason: String },
    #[error("options load: {0}")]
    Load(String),
    #[error("catalog: {0}")]
    Catalog(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("payload too large")]
    PayloadTooLarge,
    /// Database failure already mapped to a status (SQLSTATE table or default).
    #[error("{message}")]
    Database {
        status: StatusCode,
        sqlstate: Option<String>,
        message: String,
    },
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
    /// A result column the renderer cannot decode.
    #[error("column {column}: unsupported result type {type_name}")]
    Render { column: String, type_name: String },
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::Database { status, .. } => *status,
            AppError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Render { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized => "unauthorized",
            AppError::BadRequest(_) => "bad_request",
            AppError::PayloadTooLarge => "payload_too_large",
            AppError::Database { .. } => "database_error",
            AppError::Timeout(_) => "timeout",
            AppError::Render { .. } => "render_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let details = match &self {
            AppError::Database {
                sqlstate: Some(code), ..
            } => Some(serde_json::json!({ "sqlstate": code })),
            _ => None,
        };
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code().to_string(),
                message: self.to_string(),
                details,
            },
        };
        (status, Json(body)).into_response()
    }
}
