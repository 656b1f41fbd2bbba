//! Repository implementations
//!
//! This module contains concrete implementations of all repository traits
//! defined in ispdesk-core, using sqlx for PostgreSQL access.

pub mod cost_pricing_repo;
pub mod discount_repo;
pub mod email_repo;
pub mod price_sync_repo;
pub mod registrar_repo;
pub mod sales_pricing_repo;

pub use cost_pricing_repo::PgCostPricingRepository;
pub use discount_repo::{PgDiscountRepository, PgExchangeRateRepository, PgPreferenceRepository};
pub use email_repo::PgEmailQueueRepository;
pub use price_sync_repo::PgPriceSyncAuditRepository;
pub use registrar_repo::{PgRegistrarRepository, PgTldRepository};
pub use sales_pricing_repo::PgSalesPricingRepository;

use ispdesk_core::AppError;

/// SQLSTATE raised when a row violates an exclusion constraint
const EXCLUSION_VIOLATION: &str = "23P01";

/// Map a failed pricing insert, reporting a window clash as a conflict
pub(crate) fn pricing_insert_error(what: &str, err: sqlx::Error) -> AppError {
    let clashed = err
        .as_database_error()
        .and_then(|db| db.code())
        .map_or(false, |code| code == EXCLUSION_VIOLATION);

    if clashed {
        AppError::Conflict(format!(
            "{} window overlaps a row written concurrently",
            what
        ))
    } else {
        AppError::Database(format!("Failed to insert {}: {}", what, err))
    }
}
