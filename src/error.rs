//! Error types for the registration server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::NaiveDate;
use serde::Serialize;
use thiserror::Error;

/// Stable error codes returned to API consumers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ErrorCode {
    Failure = 1,
    NotAuthorized = 2,
    DbFailure = 3,
    NoSuchService = 4,
    RegistrationClosed = 5,
    NoSeatsLeft = 6,
    DateConflict = 7,
    BadValue = 8,
    AnonymizationFailure = 9,
    Timeout = 10,
}

/// Main application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authorization failed: {0}")]
    Authorization(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Registration for service {service_id} is not open")]
    WindowClosed { service_id: i32 },

    #[error("Service {service_id} has no free places left")]
    CapacityExceeded { service_id: i32 },

    #[error("Service {service_id} takes place on {date}, the same day as service {conflicting_with}")]
    DateConflict {
        service_id: i32,
        conflicting_with: i32,
        date: NaiveDate,
    },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Anonymization failed: {0}")]
    Anonymization(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Operation timed out")]
    Timeout,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Missing service, naming the id
    pub fn service_not_found(id: i32) -> Self {
        AppError::NotFound(format!("Service {} not found", id))
    }

    /// Offending service id for admission errors
    pub fn service_id(&self) -> Option<i32> {
        match self {
            AppError::WindowClosed { service_id }
            | AppError::CapacityExceeded { service_id }
            | AppError::DateConflict { service_id, .. } => Some(*service_id),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::Validation(errors.to_string())
    }
}

/// Error response body
#[derive(Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub code: u32,
    pub error: String,
    pub message: String,
    /// Service the failing rule applies to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<i32>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let service_id = self.service_id();
        let (status, code, message) = match &self {
            AppError::Authorization(msg) => {
                (StatusCode::FORBIDDEN, ErrorCode::NotAuthorized, msg.clone())
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, ErrorCode::NoSuchService, msg.clone())
            }
            AppError::WindowClosed { .. } => {
                (StatusCode::CONFLICT, ErrorCode::RegistrationClosed, self.to_string())
            }
            AppError::CapacityExceeded { .. } => {
                (StatusCode::CONFLICT, ErrorCode::NoSeatsLeft, self.to_string())
            }
            AppError::DateConflict { .. } => {
                (StatusCode::CONFLICT, ErrorCode::DateConflict, self.to_string())
            }
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, ErrorCode::BadValue, msg.clone())
            }
            AppError::Anonymization(msg) => {
                tracing::warn!("Anonymization error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::AnonymizationFailure,
                    msg.clone(),
                )
            }
            AppError::Database(e) => {
                tracing::error!("Database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::DbFailure,
                    "Database error".to_string(),
                )
            }
            AppError::Timeout => {
                (StatusCode::GATEWAY_TIMEOUT, ErrorCode::Timeout, self.to_string())
            }
            AppError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorCode::Failure,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            code: code as u32,
            error: format!("{:?}", code),
            message,
            service_id,
        });

        (status, body).into_response()
    }
}

/// Result type alias for application operations
pub type AppResult<T> = Result<T, AppError>;
