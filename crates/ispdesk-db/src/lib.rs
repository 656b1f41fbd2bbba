//! ISPDesk Database Layer
//!
//! This crate provides PostgreSQL database access and repository implementations
//! for the ISPDesk pricing backend. It includes:
//!
//! - Connection pool management with sqlx
//! - Embedded schema migrations
//! - Repository implementations for registrars, TLDs, effective-dated
//!   cost/sales pricing, discounts, exchange rates, sync audit and the email queue
//! - Transactional supersede and archival of pricing rows

pub mod pool;
pub mod repositories;

pub use pool::{create_pool, run_migrations};
pub use repositories::*;

// Re-export commonly used types
pub use ispdesk_core::{AppError, AppResult};
pub use sqlx::{PgPool, Postgres, Transaction};
