//! Business logic services for ISPDesk pricing
//!
//! This crate contains the services behind the pricing backend: the
//! effective-dated pricing store, discount resolution, currency conversion,
//! quoting, registrar selection, margin analysis, registrar price sync and
//! the outbound email queue.
//!
//! # Architecture
//!
//! - Services receive their repositories through a shared [`ServiceContext`]
//!   holding `Arc<dyn Trait>` handles, so tests swap in in-memory mocks
//! - Services are wrapped in Arc for safe sharing across async tasks
//! - All operations are instrumented with tracing
//! - Time-dependent operations have `*_at` variants taking an explicit instant
//!
//! # Services
//!
//! - `TldPricingService` - Cost/sales pricing store, scheduling and archival
//! - `DiscountResolver` - Reseller discount lookup
//! - `CurrencyConverter` - Exchange-rate conversion
//! - `PricingCalculator` - Final price quotes
//! - `RegistrarSelector` - Registrar ranking for a TLD
//! - `MarginAnalyzer` - Margin per TLD/operation with low/negative flags
//! - `RegistrarTldPriceSyncService` - Registrar price download and diff
//! - `EmailQueueService` / `EmailWorker` - Queued email delivery with retries

pub mod calculator;
pub mod context;
pub mod currency;
pub mod discount;
pub mod email_queue;
pub mod jobs;
pub mod margin;
pub mod price_sync;
pub mod pricing_store;
pub mod selection;

#[cfg(test)]
pub(crate) mod test_support;

pub use calculator::{PriceQuote, PricingCalculator, QuoteRequest, UnitPrice};
pub use context::ServiceContext;
pub use currency::CurrencyConverter;
pub use discount::DiscountResolver;
pub use email_queue::{
    EmailQueueService, EmailSender, EmailWorker, LogEmailSender, RelayEmailSender,
};
pub use jobs::{spawn_archive_job, spawn_price_sync_job};
pub use margin::{MarginAnalysis, MarginAnalyzer, MarginStatus};
pub use price_sync::RegistrarTldPriceSyncService;
pub use pricing_store::TldPricingService;
pub use selection::{RegistrarCandidate, RegistrarSelector};

/// Business logic constants
pub mod constants {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Decimal places of quoted money amounts
    pub const MONEY_SCALE: u32 = 2;

    /// Decimal places of reported margin percentages
    pub const PERCENT_SCALE: u32 = 2;

    /// Largest allowed discount percentage
    pub const MAX_DISCOUNT_PERCENT: Decimal = dec!(100);

    /// Default number of history rows returned by lookups
    pub const DEFAULT_HISTORY_LIMIT: i64 = 50;

    /// Triggered-by label of scheduled price syncs
    pub const SCHEDULER_TRIGGER: &str = "scheduler";
}
