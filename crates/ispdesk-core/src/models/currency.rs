//! Exchange rates

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::window::EffectiveDated;

/// Rate converting one unit of `base_currency` into `target_currency`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeRate {
    pub id: i64,
    pub base_currency: String,
    pub target_currency: String,
    pub rate: Decimal,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
}

impl EffectiveDated for ExchangeRate {
    fn effective_from(&self) -> DateTime<Utc> {
        self.effective_from
    }

    fn effective_to(&self) -> Option<DateTime<Utc>> {
        self.effective_to
    }
}

/// Result of a currency conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Converted {
    pub amount: Decimal,
    /// Rate applied (1 for same-currency conversions)
    pub rate: Decimal,
}
