//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service and how each kind
//! is rendered to clients.

use crate::config::ConfigError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use course_platform_core::{CatalogError, PortError};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a rule violation reported by the catalog service.
    #[error("Catalog Error: {0}")]
    Catalog(#[from] CatalogError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The request is malformed.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Credentials were rejected.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}

/// The body of every error response.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

const GENERIC_FAILURE: &str = "Something went wrong. Please try again.";

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Catalog(CatalogError::Validation(message)) | ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, message)
            }
            ApiError::Catalog(CatalogError::NotFound) | ApiError::Port(PortError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            ApiError::Catalog(CatalogError::Authentication) | ApiError::Port(PortError::Unauthorized) => {
                (StatusCode::UNAUTHORIZED, "Sign in required".to_string())
            }
            ApiError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, message),
            ApiError::Catalog(CatalogError::Authorization) => {
                (StatusCode::FORBIDDEN, "Access denied".to_string())
            }
            ApiError::Port(PortError::Conflict(message)) => (StatusCode::CONFLICT, message),
            other => {
                error!("Request failed: {:?}", other);
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}
