//! HTTP request handlers

pub mod email;
pub mod health;
pub mod price_sync;
pub mod pricing;

pub use email::configure as configure_emails;
pub use health::configure as configure_health;
pub use price_sync::configure as configure_price_sync;
pub use pricing::configure as configure_pricing;
