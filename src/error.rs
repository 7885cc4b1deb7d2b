//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),
    #[error("entity '{entity}': {reason}")]
    InvalidEntity { entity: String, reason: String },
    #[error("entity '{0}': table not found or has no columns")]
    MissingTable(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Failures raised by a store backend. Translated into an [`ApiError`] by the dispatcher.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("unknown field '{0}'")]
    UnknownField(String),
    #[error("{0}")]
    Rejected(String),
    #[error("session pool closed")]
    PoolClosed,
}

/// The abstract outcome kinds a request can terminate with.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("unknown entity: {0}")]
    UnknownEntity(String),
    #[error("malformed body: {0}")]
    MalformedBody(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    ValidationFailure(String),
    #[error("invalid pagination parameter: {0}")]
    InvalidPaginationParameter(String),
    #[error("execution: {0}")]
    ExecutionFailure(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownEntity(_) => StatusCode::NOT_FOUND,
            ApiError::MalformedBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ValidationFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidPaginationParameter(_) => StatusCode::BAD_REQUEST,
            ApiError::ExecutionFailure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownEntity(_) => "unknown_entity",
            ApiError::MalformedBody(_) => "malformed_body",
            ApiError::NotFound(_) => "not_found",
            ApiError::ValidationFailure(_) => "validation_failure",
            ApiError::InvalidPaginationParameter(_) => "invalid_pagination_parameter",
            ApiError::ExecutionFailure(_) => "execution_failure",
        }
    }
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        } else {
            tracing::warn!(code, error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}
