//! Error types for the admin data-access layer

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{message}")]
    Validation {
        message: String,
        errors: Vec<ValidationIssue>,
        allowed_sort_fields: Vec<&'static str>,
    },

    #[error("Query execution failed: {0}")]
    Database(#[from] StoreError),

    #[error("Failed to decode {resource} row: {source}")]
    RowDecode {
        resource: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Validation failure carrying field-level detail.
    pub fn validation(
        errors: Vec<ValidationIssue>,
        allowed_sort_fields: &[&'static str],
    ) -> Self {
        let message = match errors.len() {
            1 => format!("Invalid query parameters: {}", errors[0].message),
            n => format!("Invalid query parameters ({n} problems)"),
        };
        Error::Validation {
            message,
            errors,
            allowed_sort_fields: allowed_sort_fields.to_vec(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation { .. } => StatusCode::BAD_REQUEST,
            Error::Database(_) | Error::RowDecode { .. } | Error::Config(_) | Error::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// JSON body returned to the admin UI.
    pub fn to_body(&self) -> serde_json::Value {
        match self {
            Error::Validation {
                message,
                errors,
                allowed_sort_fields,
            } => json!({
                "success": false,
                "message": message,
                "errors": errors,
                "allowedSortFields": allowed_sort_fields,
            }),
            Error::Database(source) => json!({
                "success": false,
                "message": "Query execution failed",
                "error": source.to_string(),
            }),
            Error::RowDecode { .. } | Error::Config(_) | Error::Internal(_) => json!({
                "success": false,
                "message": "Internal server error",
            }),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Error::Validation { errors, .. } => {
                tracing::debug!(problems = errors.len(), "Rejected listing request");
            }
            Error::Database(source) => {
                tracing::error!(error = %source, "Listing query failed");
            }
            _ => tracing::error!("Internal error: {}", self),
        }
        (status, Json(self.to_body())).into_response()
    }
}

/// Errors raised by a backing-store handle.
///
/// The classification drives the pool's retry policy: client errors are permanent and returned
/// as-is, transient errors are retried with back-off.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// 4xx-equivalent: the request itself is wrong (constraint violation, bad input, permission).
    #[error("{message} (code {code})")]
    Client { code: String, message: String },

    /// 5xx-equivalent: server fault, network failure, dropped connection.
    #[error("{0}")]
    Transient(String),
}

impl StoreError {
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        StoreError::Client {
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StoreError::Transient(message.into())
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, StoreError::Client { .. })
    }
}

/// SQLSTATE classes that indicate a problem with the request rather than the server.
const CLIENT_SQLSTATE_CLASSES: &[&str] = &["22", "23", "28", "42", "0A"];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Database(db) => {
                let code = db.code().map(|c| c.into_owned()).unwrap_or_default();
                if CLIENT_SQLSTATE_CLASSES
                    .iter()
                    .any(|class| code.starts_with(class))
                {
                    StoreError::Client {
                        code,
                        message: db.message().to_string(),
                    }
                } else {
                    StoreError::Transient(err.to_string())
                }
            }
            sqlx::Error::Configuration(_)
            | sqlx::Error::ColumnNotFound(_)
            | sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::TypeNotFound { .. } => StoreError::Client {
                code: "decode".to_string(),
                message: err.to_string(),
            },
            _ => StoreError::Transient(err.to_string()),
        }
    }
}

/// One field-level validation problem.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub code: ValidationCode,
    pub field: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        code: ValidationCode,
        field: impl Into<String>,
        message: impl Into<String>,
        value: Option<String>,
    ) -> Self {
        Self {
            code,
            field: field.into(),
            message: message.into(),
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ValidationCode {
    InvalidDate,
    InvalidPage,
    InvalidLimit,
    InvalidSortField,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_lists_errors_and_sort_fields() {
        let err = Error::validation(
            vec![ValidationIssue::new(
                ValidationCode::InvalidPage,
                "page",
                "page must be at least 1",
                Some("0".to_string()),
            )],
            &["name", "created_at"],
        );

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        let body = err.to_body();
        assert_eq!(body["success"], false);
        assert_eq!(body["errors"][0]["code"], "INVALID_PAGE");
        assert_eq!(body["errors"][0]["field"], "page");
        assert_eq!(body["errors"][0]["value"], "0");
        assert_eq!(body["allowedSortFields"][1], "created_at");
    }

    #[test]
    fn database_error_keeps_underlying_message() {
        let err = Error::from(StoreError::transient("connection reset by peer"));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = err.to_body();
        assert_eq!(body["message"], "Query execution failed");
        assert_eq!(body["error"], "connection reset by peer");
    }

    #[test]
    fn io_failures_are_transient() {
        let err = StoreError::from(sqlx::Error::PoolTimedOut);
        assert!(!err.is_client_error());
        let err = StoreError::from(sqlx::Error::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionReset,
            "reset",
        )));
        assert!(!err.is_client_error());
    }
}
