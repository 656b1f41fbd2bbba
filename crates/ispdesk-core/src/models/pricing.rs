//! Cost and sales pricing models
//!
//! Cost pricing is what a registrar charges us for an offering; sales
//! pricing is what we charge for a TLD. Both are effective-dated and at most
//! one row per key is current at any instant.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::sync::NewPriceChangeLog;
use super::tld::{normalize_currency, PricingOperation};
use super::window::EffectiveDated;

/// Decimal places kept by the price columns (`NUMERIC(12, 4)`)
pub const PRICE_SCALE: u32 = 4;

/// Exclusive upper bound of a storable price (8 integer digits)
const PRICE_LIMIT: i64 = 100_000_000;

/// Registration/renewal/transfer amounts in one currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PriceSet {
    pub registration: Decimal,
    pub renewal: Decimal,
    pub transfer: Decimal,
}

impl PriceSet {
    pub fn new(registration: Decimal, renewal: Decimal, transfer: Decimal) -> Self {
        Self {
            registration,
            renewal,
            transfer,
        }
    }

    /// Amount for one operation
    #[inline]
    pub fn price_for(&self, operation: PricingOperation) -> Decimal {
        match operation {
            PricingOperation::Registration => self.registration,
            PricingOperation::Renewal => self.renewal,
            PricingOperation::Transfer => self.transfer,
        }
    }

    /// Check that no amount is negative
    pub fn is_non_negative(&self) -> bool {
        !self.registration.is_sign_negative()
            && !self.renewal.is_sign_negative()
            && !self.transfer.is_sign_negative()
    }

    /// Round every amount the way the price columns store it
    ///
    /// Returns None if an amount does not fit the column.
    pub fn to_stored_scale(&self) -> Option<Self> {
        fn stored(amount: Decimal) -> Option<Decimal> {
            let rounded =
                amount.round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::MidpointAwayFromZero);
            (rounded.abs() < Decimal::from(PRICE_LIMIT)).then_some(rounded)
        }

        Some(Self::new(
            stored(self.registration)?,
            stored(self.renewal)?,
            stored(self.transfer)?,
        ))
    }
}

/// Registrar cost for one registrar-TLD offering over a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarTldCostPricing {
    /// Unique identifier
    pub id: i64,

    pub registrar_tld_id: i32,

    pub effective_from: DateTime<Utc>,

    /// None = open-ended
    pub effective_to: Option<DateTime<Utc>>,

    pub costs: PriceSet,

    /// ISO 4217 code
    pub currency: String,

    pub is_active: bool,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl RegistrarTldCostPricing {
    /// Check if `costs`/`currency` differ from this row
    ///
    /// Currency comparison ignores case.
    pub fn differs_from(&self, costs: &PriceSet, currency: &str) -> bool {
        self.costs != *costs || normalize_currency(&self.currency) != normalize_currency(currency)
    }
}

impl EffectiveDated for RegistrarTldCostPricing {
    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }

    fn effective_to(&self) -> Option<DateTime<Utc>> {
        self.effective_to
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Sales price for a TLD over a time window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TldSalesPricing {
    /// Unique identifier
    pub id: i64,

    pub tld_id: i32,

    pub effective_from: DateTime<Utc>,

    /// None = open-ended
    pub effective_to: Option<DateTime<Utc>>,

    pub prices: PriceSet,

    /// ISO 4217 code
    pub currency: String,

    pub is_active: bool,

    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl EffectiveDated for TldSalesPricing {
    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }

    fn effective_to(&self) -> Option<DateTime<Utc>> {
        self.effective_to
    }

    fn is_active(&self) -> bool {
        self.is_active
    }
}

/// Data for inserting a cost pricing row
#[derive(Debug, Clone)]
pub struct NewCostPricing {
    pub registrar_tld_id: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub costs: PriceSet,
    pub currency: String,
    pub notes: Option<String>,
}

/// Data for inserting a sales pricing row
#[derive(Debug, Clone)]
pub struct NewSalesPricing {
    pub tld_id: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub prices: PriceSet,
    pub currency: String,
    pub notes: Option<String>,
}

/// Atomic replacement of a registrar-TLD cost
///
/// Closes the previous row (if any), inserts the new row and records the
/// change, all in one transaction.
#[derive(Debug, Clone)]
pub struct SupersedeCostPricing {
    /// Row to close and its new end bound
    pub previous: Option<(i64, DateTime<Utc>)>,
    pub new: NewCostPricing,
    pub change_log: NewPriceChangeLog,
}

/// Atomic replacement of a TLD sales price
#[derive(Debug, Clone)]
pub struct SupersedeSalesPricing {
    pub previous: Option<(i64, DateTime<Utc>)>,
    pub new: NewSalesPricing,
}

/// Counts reported by an archival run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveStats {
    pub cost_rows: u64,
    pub sales_rows: u64,
}
