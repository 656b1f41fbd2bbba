//! API layer for ISPDesk pricing
//!
//! HTTP handlers for quotes, margin reports, pricing maintenance, registrar
//! price sync and the outbound email queue.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod dto;
pub mod handlers;
pub mod state;

use actix_web::web;

// Re-export DTOs (common types)
pub use dto::{ApiResponse, PaginationParams};
pub use state::AppState;

pub use handlers::{configure_emails, configure_health, configure_price_sync, configure_pricing};

/// Mount every route under `/api/v1`
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api/v1")
            .configure(configure_health)
            .configure(configure_pricing)
            .configure(configure_price_sync)
            .configure(configure_emails),
    );
}
