//! Unified error handling for ISPDesk
//!
//! This module provides a comprehensive error type that covers all possible
//! failure scenarios in the pricing backend, with automatic HTTP response mapping.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Main application error type
///
/// All errors in the application should be converted to this type.
/// It implements `ResponseError` for automatic HTTP response generation.
#[derive(Error, Debug)]
pub enum AppError {
    // ==================== Database Errors ====================
    #[error("Database error: {0}")]
    Database(String),

    #[error("Database pool error: {0}")]
    Pool(String),

    #[error("Transaction failed: {0}")]
    Transaction(String),

    #[error("Migration failed: {0}")]
    Migration(String),

    // ==================== Registrar Errors ====================
    #[error("Registrar error: {0}")]
    Registrar(String),

    #[error("Registrar not found: {0}")]
    RegistrarNotFound(String),

    #[error("Registrar code mismatch: expected {expected}, client reports {actual}")]
    RegistrarCodeMismatch { expected: String, actual: String },

    #[error("Price sync cancelled")]
    SyncCancelled,

    // ==================== Pricing Errors ====================
    #[error("TLD not found: {0}")]
    TldNotFound(String),

    #[error("No pricing found: {0}")]
    PricingNotFound(String),

    #[error("Pricing window overlaps existing row {existing_id} for {key}")]
    OverlappingPricing { key: String, existing_id: i64 },

    #[error("No exchange rate from {from} to {to}")]
    ExchangeRateNotFound { from: String, to: String },

    // ==================== Email Errors ====================
    #[error("Email delivery failed: {0}")]
    EmailDelivery(String),

    // ==================== Validation Errors ====================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ==================== Resource Errors ====================
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // ==================== Internal Errors ====================
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Returns the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation(_) | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::RegistrarNotFound(_)
            | AppError::TldNotFound(_)
            | AppError::PricingNotFound(_)
            | AppError::ExchangeRateNotFound { .. }
            | AppError::NotFound(_) => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::Conflict(_)
            | AppError::OverlappingPricing { .. } => StatusCode::CONFLICT,

            // 422 Unprocessable Entity
            AppError::RegistrarCodeMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 502 Bad Gateway
            AppError::Registrar(_) | AppError::EmailDelivery(_) => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "database_error",
            AppError::Pool(_) => "pool_error",
            AppError::Transaction(_) => "transaction_error",
            AppError::Migration(_) => "migration_error",
            AppError::Registrar(_) => "registrar_error",
            AppError::RegistrarNotFound(_) => "registrar_not_found",
            AppError::RegistrarCodeMismatch { .. } => "registrar_code_mismatch",
            AppError::SyncCancelled => "sync_cancelled",
            AppError::TldNotFound(_) => "tld_not_found",
            AppError::PricingNotFound(_) => "pricing_not_found",
            AppError::OverlappingPricing { .. } => "overlapping_pricing",
            AppError::ExchangeRateNotFound { .. } => "exchange_rate_not_found",
            AppError::EmailDelivery(_) => "email_delivery_error",
            AppError::Validation(_) => "validation_error",
            AppError::InvalidInput(_) => "invalid_input",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Internal(_) => "internal_error",
            AppError::Config(_) => "config_error",
            AppError::Serialization(_) => "serialization_error",
        }
    }
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        AppError::status_code(self)
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        let body = json!({
            "error": self.error_code(),
            "message": self.to_string(),
            "status": status.as_u16(),
        });

        HttpResponse::build(status).json(body)
    }
}

// ==================== From implementations ====================

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}
