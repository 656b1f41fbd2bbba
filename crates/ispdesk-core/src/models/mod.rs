//! Domain models for ISPDesk pricing
//!
//! This module contains the core domain models used throughout the pricing backend.

pub mod currency;
pub mod discount;
pub mod email;
pub mod pricing;
pub mod sync;
pub mod tld;
pub mod window;

pub use currency::{Converted, ExchangeRate};
pub use discount::{NewDiscount, RegistrarSelectionPreference, ResellerTldDiscount};
pub use email::{EmailStatus, NewEmail, QueuedEmail, RetryDecision};
pub use pricing::{
    ArchiveStats, NewCostPricing, NewSalesPricing, PriceSet, RegistrarTldCostPricing,
    SupersedeCostPricing, SupersedeSalesPricing, TldSalesPricing, PRICE_SCALE,
};
pub use sync::{
    NewPriceChangeLog, RegistrarTldPriceChangeLog, RegistrarTldPriceDownloadSession,
    SessionOutcome,
};
pub use tld::{
    normalize_currency, normalize_extension, PricingOperation, Registrar, RegistrarTld, Tld,
};
pub use window::{close_before, windows_overlap, EffectiveDated};
