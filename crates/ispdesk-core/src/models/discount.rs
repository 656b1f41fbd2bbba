//! Reseller discounts and registrar selection preferences

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::tld::PricingOperation;
use super::window::EffectiveDated;

/// Discount granted to a reseller company on a TLD
///
/// A discount carries a percentage, a fixed amount, or both. When `operation`
/// is None the discount applies to every operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResellerTldDiscount {
    /// Unique identifier
    pub id: i64,

    pub reseller_company_id: i32,

    pub tld_id: i32,

    pub effective_from: DateTime<Utc>,

    /// None = open-ended
    pub effective_to: Option<DateTime<Utc>>,

    /// Percentage off, in (0, 100]
    pub discount_percentage: Option<Decimal>,

    /// Fixed amount off, in `currency`
    pub discount_amount: Option<Decimal>,

    /// Currency of `discount_amount` (None = same as the price)
    pub currency: Option<String>,

    /// Operation the discount is limited to (None = all operations)
    pub operation: Option<PricingOperation>,

    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

impl ResellerTldDiscount {
    /// Check if the discount covers `operation`
    pub fn applies_to(&self, operation: PricingOperation) -> bool {
        self.operation.map_or(true, |op| op == operation)
    }

    /// Apply the discount to a unit price
    ///
    /// The percentage is taken first, then the fixed amount. The result never
    /// drops below zero. `discount_amount` is assumed to be in the price's
    /// currency already.
    pub fn apply(&self, price: Decimal) -> Decimal {
        self.apply_with_amount(price, self.discount_amount)
    }

    /// Apply the discount using an explicitly converted fixed amount
    pub fn apply_with_amount(&self, price: Decimal, amount: Option<Decimal>) -> Decimal {
        let mut discounted = price;

        if let Some(pct) = self.discount_percentage {
            discounted -= discounted * pct / Decimal::ONE_HUNDRED;
        }

        if let Some(amount) = amount {
            discounted -= amount;
        }

        discounted.max(Decimal::ZERO)
    }
}

impl EffectiveDated for ResellerTldDiscount {
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

/// Data for inserting a discount
#[derive(Debug, Clone)]
pub struct NewDiscount {
    pub reseller_company_id: i32,
    pub tld_id: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub discount_percentage: Option<Decimal>,
    pub discount_amount: Option<Decimal>,
    pub currency: Option<String>,
    pub operation: Option<PricingOperation>,
}

/// Priority weight for picking a registrar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrarSelectionPreference {
    pub id: i32,

    pub registrar_id: i32,

    /// Higher wins
    pub priority: i32,

    pub is_active: bool,
}
