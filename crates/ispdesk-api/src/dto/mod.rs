//! Data Transfer Objects (DTOs) for API requests and responses

pub mod common;
pub mod email;
pub mod price_sync;
pub mod pricing;

pub use common::*;
pub use email::*;
pub use price_sync::*;
pub use pricing::*;
