use axum::{http::StatusCode, response::Json};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::ledger::LedgerError;

/// Wire shape of every error response: `{"error": "..."}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Error context for structured logging
#[derive(Debug, Clone)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.resource_id = Some(id.into());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ErrorBody>) {
        match &self {
            ApiError::NotFound(message) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (StatusCode::NOT_FOUND, Json(ErrorBody::new(message)))
            }
            ApiError::ValidationError(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message)))
            }
            ApiError::BadRequest(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Bad request"
                );
                (StatusCode::BAD_REQUEST, Json(ErrorBody::new(message)))
            }
            ApiError::Unauthorized(message) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    error = %self,
                    "Unauthorized request"
                );
                (StatusCode::UNAUTHORIZED, Json(ErrorBody::new(message)))
            }
            ApiError::DatabaseError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Database error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorBody::new(
                        "Database operation failed. Please try again.",
                    )),
                )
            }
        }
    }

    /// Simple conversion without context
    pub fn to_response(self) -> (StatusCode, Json<ErrorBody>) {
        let context = ErrorContext::new("unknown", "resource");
        self.to_response_with_context(context)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::DatabaseError(anyhow::Error::from(err))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        classify_database_error(&err)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

/// Helper function to detect error types from anyhow error messages
pub fn classify_database_error(error: &anyhow::Error) -> ApiError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("not found") || error_str.contains("no rows") {
        ApiError::NotFound("Resource not found".to_string())
    } else if error_str.contains("required") || error_str.contains("cannot be null") {
        ApiError::ValidationError("Required field is missing or invalid".to_string())
    } else {
        ApiError::DatabaseError(anyhow::anyhow!("{}", error))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_creation() {
        let context = ErrorContext::new("create_study", "estudo").with_id("123");

        assert_eq!(context.operation, "create_study");
        assert_eq!(context.resource_type, "estudo");
        assert_eq!(context.resource_id, Some("123".to_string()));
    }

    #[test]
    fn test_error_classification() {
        let not_found_error = anyhow::anyhow!("No rows returned");
        let classified = classify_database_error(&not_found_error);
        assert!(matches!(classified, ApiError::NotFound(_)));

        let validation_error = anyhow::anyhow!("Field cannot be null");
        let classified = classify_database_error(&validation_error);
        assert!(matches!(classified, ApiError::ValidationError(_)));

        let other = anyhow::anyhow!("disk I/O error");
        let classified = classify_database_error(&other);
        assert!(matches!(classified, ApiError::DatabaseError(_)));
    }

    #[test]
    fn test_api_error_responses() {
        let error = ApiError::NotFound("estudo não encontrado".to_string());
        let context = ErrorContext::new("get_study", "estudo").with_id("123");
        let (status, body) = error.to_response_with_context(context);
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body.error, "estudo não encontrado");

        let error = ApiError::ValidationError("curso e conteudo são obrigatórios".to_string());
        let (status, body) = error.to_response();
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.error, "curso e conteudo são obrigatórios");

        let error = ApiError::Unauthorized("sessão inválida".to_string());
        let (status, _) = error.to_response();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_ledger_error_maps_to_not_found() {
        let error: ApiError = LedgerError::ReviewNotFound(7).into();
        assert!(matches!(error, ApiError::NotFound(_)));
    }
}
