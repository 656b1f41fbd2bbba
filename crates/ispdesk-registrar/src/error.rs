//! Registrar client errors

use ispdesk_core::AppError;
use thiserror::Error;

/// Result alias for registrar client calls
pub type Result<T> = std::result::Result<T, RegistrarError>;

/// Errors returned by registrar clients
#[derive(Debug, Error)]
pub enum RegistrarError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("HTTP error: status {0}")]
    HttpError(u16),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Authentication rejected by registrar")]
    Unauthorized,

    #[error("Timeout: request took longer than {0}ms")]
    Timeout(u64),

    #[error("No client configured for registrar '{0}'")]
    NotConfigured(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<RegistrarError> for AppError {
    fn from(err: RegistrarError) -> Self {
        match err {
            RegistrarError::NotConfigured(code) => AppError::RegistrarNotFound(code),
            RegistrarError::Config(msg) => AppError::Config(msg),
            other => AppError::Registrar(other.to_string()),
        }
    }
}
