//! Registrar API payload types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Price information for one TLD as reported by a registrar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TldPriceInfo {
    /// Extension as the registrar spells it (may carry a leading dot)
    pub extension: String,

    #[serde(default)]
    pub registration_price: Option<Decimal>,

    #[serde(default)]
    pub renewal_price: Option<Decimal>,

    #[serde(default)]
    pub transfer_price: Option<Decimal>,

    #[serde(default)]
    pub currency: Option<String>,
}

impl TldPriceInfo {
    /// Check if at least one price is present
    pub fn has_price_data(&self) -> bool {
        self.registration_price.is_some()
            || self.renewal_price.is_some()
            || self.transfer_price.is_some()
    }
}

/// Response of the supported-TLDs endpoint
#[derive(Debug, Deserialize)]
pub struct TldListResponse {
    #[serde(default)]
    pub tlds: Vec<TldPriceInfo>,
}

/// Availability of a domain name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainAvailability {
    pub domain: String,

    pub available: bool,

    #[serde(default)]
    pub premium: bool,

    /// Registration price when the registrar quotes one (premium names)
    #[serde(default)]
    pub price: Option<Decimal>,

    #[serde(default)]
    pub currency: Option<String>,
}
