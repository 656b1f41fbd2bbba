//! Registrar and TLD models
//!
//! A `RegistrarTld` is a registrar's local offering of a TLD; cost prices
//! hang off offerings while sales prices hang off the TLD itself.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Priced domain operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PricingOperation {
    Registration,
    Renewal,
    Transfer,
}

impl PricingOperation {
    /// All operations, in display order
    pub const ALL: [PricingOperation; 3] = [
        PricingOperation::Registration,
        PricingOperation::Renewal,
        PricingOperation::Transfer,
    ];

    /// Parse from string (case-insensitive)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "registration" | "register" => Some(PricingOperation::Registration),
            "renewal" | "renew" => Some(PricingOperation::Renewal),
            "transfer" => Some(PricingOperation::Transfer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PricingOperation::Registration => "registration",
            PricingOperation::Renewal => "renewal",
            PricingOperation::Transfer => "transfer",
        }
    }
}

impl fmt::Display for PricingOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Domain registration provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Registrar {
    /// Unique identifier
    pub id: i32,

    /// Short code used to pick the API client (e.g., "opensrs")
    pub code: String,

    /// Display name
    pub name: String,

    /// API base URL when not configured explicitly
    pub api_url: Option<String>,

    /// Inactive registrars are skipped by the price sync
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Top-level domain
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tld {
    /// Unique identifier
    pub id: i32,

    /// Normalized extension without leading dot (e.g., "com", "co.uk")
    pub extension: String,

    /// Optional description
    pub description: Option<String>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A registrar's offering of a TLD
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarTld {
    /// Unique identifier
    pub id: i32,

    pub registrar_id: i32,

    pub tld_id: i32,

    /// Extension of the TLD (denormalized for matching)
    pub extension: String,

    pub is_active: bool,
}

/// Normalize a TLD extension for matching
///
/// Trims whitespace, strips leading dots and lowercases ASCII.
pub fn normalize_extension(extension: &str) -> String {
    extension.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// Normalize an ISO 4217 currency code
pub fn normalize_currency(currency: &str) -> String {
    currency.trim().to_ascii_uppercase()
}

/// Check that a currency code looks like ISO 4217 (three ASCII letters)
pub fn is_valid_currency(currency: &str) -> bool {
    let trimmed = currency.trim();
    trimmed.len() == 3 && trimmed.chars().all(|c| c.is_ascii_alphabetic())
}
