//! ISPDesk Registrar Clients
//!
//! Abstraction over domain registrar APIs used by the price sync:
//!
//! - [`RegistrarClient`] trait for fetching TLD prices and checking availability
//! - [`HttpRegistrarClient`], a JSON-over-HTTP implementation
//! - [`RegistrarClientFactory`] resolving a client for a registrar row

pub mod client;
pub mod error;
pub mod factory;
pub mod types;

pub use client::{HttpRegistrarClient, RegistrarClient};
pub use error::{RegistrarError, Result};
pub use factory::{ConfiguredClientFactory, RegistrarClientFactory};
pub use types::{DomainAvailability, TldPriceInfo};
