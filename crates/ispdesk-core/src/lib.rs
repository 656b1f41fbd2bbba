//! ISPDesk Core Library
//!
//! This crate provides the foundational types, traits, and error handling
//! for the ISPDesk pricing backend. It includes:
//!
//! - Domain models (registrars, TLDs, effective-dated cost/sales pricing,
//!   reseller discounts, price-sync audit records, queued emails)
//! - Repository traits implemented by the database layer
//! - Unified error handling with HTTP response mapping
//! - Application configuration

pub mod config;
pub mod error;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use error::AppError;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
