//! Currency conversion service
//!
//! Converts amounts using the exchange rate current at a given instant.
//! A direct `base -> target` rate is preferred; otherwise the inverse of the
//! reverse rate is used.

use chrono::{DateTime, Utc};
use ispdesk_core::{
    models::{normalize_currency, Converted},
    AppError, AppResult,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::context::ServiceContext;

/// Exchange-rate conversion
pub struct CurrencyConverter {
    ctx: Arc<ServiceContext>,
}

impl CurrencyConverter {
    /// Create a new currency converter
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Rate to multiply `from` amounts by to get `to` amounts
    #[instrument(skip(self))]
    pub async fn rate(&self, from: &str, to: &str, at: DateTime<Utc>) -> AppResult<Decimal> {
        let from = normalize_currency(from);
        let to = normalize_currency(to);

        if from == to {
            return Ok(Decimal::ONE);
        }

        if let Some(direct) = self.ctx.exchange_rates.find_current(&from, &to, at).await? {
            if !direct.rate.is_zero() {
                debug!("Direct rate {} -> {}: {}", from, to, direct.rate);
                return Ok(direct.rate);
            }
            warn!("Ignoring zero exchange rate {} -> {} (id {})", from, to, direct.id);
        }

        if let Some(reverse) = self.ctx.exchange_rates.find_current(&to, &from, at).await? {
            if !reverse.rate.is_zero() {
                let rate = Decimal::ONE / reverse.rate;
                debug!("Inverse rate {} -> {}: {}", from, to, rate);
                return Ok(rate);
            }
            warn!("Ignoring zero exchange rate {} -> {} (id {})", to, from, reverse.id);
        }

        Err(AppError::ExchangeRateNotFound { from, to })
    }

    /// Convert `amount` from one currency to another at `at`
    pub async fn convert(
        &self,
        amount: Decimal,
        from: &str,
        to: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Converted> {
        let rate = self.rate(from, to, at).await?;
        Ok(Converted {
            amount: amount * rate,
            rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ts, InMemoryStore};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_identity_conversion_ignores_case() {
        let store = InMemoryStore::new();
        let converter = CurrencyConverter::new(store.context());

        let converted = converter.convert(dec!(12.5), "usd", "USD", ts(0)).await.unwrap();
        assert_eq!(converted.amount, dec!(12.5));
        assert_eq!(converted.rate, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_direct_rate() {
        let store = InMemoryStore::new();
        store.add_rate("EUR", "USD", dec!(1.10)).await;
        let converter = CurrencyConverter::new(store.context());

        let converted = converter.convert(dec!(10), "EUR", "USD", ts(0)).await.unwrap();
        assert_eq!(converted.amount, dec!(11.00));
    }

    #[tokio::test]
    async fn test_inverse_rate() {
        let store = InMemoryStore::new();
        store.add_rate("USD", "EUR", dec!(0.8)).await;
        let converter = CurrencyConverter::new(store.context());

        let converted = converter.convert(dec!(10), "EUR", "USD", ts(0)).await.unwrap();
        assert_eq!(converted.rate, dec!(1.25));
        assert_eq!(converted.amount, dec!(12.50));
    }

    #[tokio::test]
    async fn test_missing_rate() {
        let store = InMemoryStore::new();
        store.add_rate("USD", "EUR", dec!(0)).await;
        let converter = CurrencyConverter::new(store.context());

        let result = converter.convert(dec!(10), "EUR", "USD", ts(0)).await;
        assert!(matches!(
            result,
            Err(AppError::ExchangeRateNotFound { ref from, ref to }) if from == "EUR" && to == "USD"
        ));
    }
}
