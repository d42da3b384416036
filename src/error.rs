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
    #[error("missing reference: {kind} '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table} column {column}")]
    InvalidPrimaryKey { table: String, column: String },
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("duplicate {kind}: {name}")]
    Duplicate { kind: &'static str, name: String },
    #[error("config load: {0}")]
    Load(String),
}

#[derive(Error, Debug)]
pub enum HandleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid options: {0}")]
    InvalidOptions(String),
    #[error("unknown column: {0}")]
    UnknownColumn(String),
    #[error("unknown include: {0}")]
    UnknownInclude(String),
    #[error("unknown scope: {0}")]
    UnknownScope(String),
    #[error("{0} is not supported by this model")]
    Unsupported(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("mock generator not configured; set HandleOptions::mock to use Handle::mock")]
    MockUnavailable,
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("{0}")]
    Custom(String),
}

impl HandleError {
    /// Status code and machine-readable code used in error bodies.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            HandleError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config_error"),
            HandleError::InvalidOptions(_) => (StatusCode::BAD_REQUEST, "invalid_options"),
            HandleError::UnknownColumn(_) => (StatusCode::BAD_REQUEST, "unknown_column"),
            HandleError::UnknownInclude(_) => (StatusCode::BAD_REQUEST, "unknown_include"),
            HandleError::UnknownScope(_) => (StatusCode::INTERNAL_SERVER_ERROR, "unknown_scope"),
            HandleError::Unsupported(_) => (StatusCode::NOT_IMPLEMENTED, "unsupported"),
            HandleError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            HandleError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation_error"),
            HandleError::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            HandleError::MockUnavailable => (StatusCode::NOT_IMPLEMENTED, "mock_unavailable"),
            HandleError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    (StatusCode::NOT_FOUND, "not_found")
                } else {
                    (StatusCode::INTERNAL_SERVER_ERROR, "database_error")
                }
            }
            HandleError::Custom(_) => (StatusCode::INTERNAL_SERVER_ERROR, "error"),
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
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for HandleError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message: self.to_string(),
                details: None,
            },
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_404() {
        let (status, code) = HandleError::Db(sqlx::Error::RowNotFound).status_and_code();
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(code, "not_found");
    }

    #[test]
    fn into_response_uses_the_mapped_status() {
        let res = HandleError::UnknownColumn("body".into()).into_response();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn config_errors_are_server_errors() {
        let err: HandleError = ConfigError::Load("boom".into()).into();
        assert_eq!(err.status_and_code().0, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "config load: boom");
    }
}
