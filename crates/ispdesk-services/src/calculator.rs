//! Pricing calculator
//!
//! Combines the current sales price, the reseller's discount and currency
//! conversion into a final quote. Intermediate amounts keep full precision;
//! only the quoted money amounts are rounded.

use chrono::{DateTime, Utc};
use ispdesk_core::{
    config::PricingConfig,
    models::{normalize_currency, normalize_extension, PricingOperation},
    AppError, AppResult,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::constants::MONEY_SCALE;
use crate::context::ServiceContext;
use crate::currency::CurrencyConverter;
use crate::discount::DiscountResolver;

/// Quote request
#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub extension: String,
    pub operation: PricingOperation,
    pub years: u32,
    pub reseller_company_id: Option<i32>,
    /// Currency to quote in (None = the sales price currency)
    pub currency: Option<String>,
    pub at: DateTime<Utc>,
}

/// Per-year price for one TLD operation, unrounded, in the sales currency
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitPrice {
    pub tld_id: i32,
    pub sales_pricing_id: i64,
    pub list_price: Decimal,
    pub price: Decimal,
    pub currency: String,
    pub discount_id: Option<i64>,
}

/// Final price for a request
#[derive(Debug, Clone, Serialize)]
pub struct PriceQuote {
    pub extension: String,
    pub tld_id: i32,
    pub operation: PricingOperation,
    pub years: u32,
    pub currency: String,
    /// Undiscounted price per year
    pub unit_list_price: Decimal,
    /// Discounted price per year
    pub unit_price: Decimal,
    pub total: Decimal,
    pub discount_id: Option<i64>,
    /// Rate from the sales currency to `currency`
    pub exchange_rate: Decimal,
    pub quoted_at: DateTime<Utc>,
}

/// Round a money amount for presentation
#[inline]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Quote calculator
pub struct PricingCalculator {
    ctx: Arc<ServiceContext>,
    discounts: DiscountResolver,
    converter: CurrencyConverter,
    config: PricingConfig,
}

impl PricingCalculator {
    /// Create a new pricing calculator
    pub fn new(ctx: Arc<ServiceContext>, config: PricingConfig) -> Self {
        Self {
            discounts: DiscountResolver::new(Arc::clone(&ctx)),
            converter: CurrencyConverter::new(Arc::clone(&ctx)),
            ctx,
            config,
        }
    }

    /// Discounted per-year price at `at`, or None without a current sales row
    #[instrument(skip(self))]
    pub async fn unit_price_at(
        &self,
        tld_id: i32,
        operation: PricingOperation,
        reseller_company_id: Option<i32>,
        at: DateTime<Utc>,
    ) -> AppResult<Option<UnitPrice>> {
        let sales = match self.ctx.sales_pricing.find_current(tld_id, at).await? {
            Some(sales) => sales,
            None => {
                debug!("No current sales pricing for tld {}", tld_id);
                return Ok(None);
            }
        };

        let list_price = sales.prices.price_for(operation);
        let mut unit = UnitPrice {
            tld_id,
            sales_pricing_id: sales.id,
            list_price,
            price: list_price,
            currency: sales.currency.clone(),
            discount_id: None,
        };

        let company_id = match reseller_company_id {
            Some(id) => id,
            None => return Ok(Some(unit)),
        };

        if let Some(discount) = self
            .discounts
            .resolve(company_id, tld_id, operation, at)
            .await?
        {
            let amount = match (discount.discount_amount, discount.currency.as_deref()) {
                (Some(amount), Some(currency)) => Some(
                    self.converter
                        .convert(amount, currency, &sales.currency, at)
                        .await?
                        .amount,
                ),
                (amount, _) => amount,
            };

            unit.price = discount.apply_with_amount(list_price, amount);
            unit.discount_id = Some(discount.id);
            debug!(
                "Discount {} takes {} {} to {}",
                discount.id, operation, list_price, unit.price
            );
        }

        Ok(Some(unit))
    }

    /// Quote a TLD operation for a number of years
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` if `years` is outside 1..=`max_quote_years`
    /// - `AppError::TldNotFound` if the extension is unknown
    /// - `AppError::PricingNotFound` if the TLD has no current sales price
    /// - `AppError::ExchangeRateNotFound` if a needed rate is missing
    #[instrument(skip(self), fields(extension = %request.extension, operation = %request.operation))]
    pub async fn quote(&self, request: &QuoteRequest) -> AppResult<PriceQuote> {
        if request.years == 0 || request.years > self.config.max_quote_years {
            return Err(AppError::Validation(format!(
                "years must be between 1 and {}",
                self.config.max_quote_years
            )));
        }

        let extension = normalize_extension(&request.extension);
        let tld = self
            .ctx
            .tlds
            .find_by_extension(&extension)
            .await?
            .ok_or_else(|| AppError::TldNotFound(extension.clone()))?;

        let unit = self
            .unit_price_at(
                tld.id,
                request.operation,
                request.reseller_company_id,
                request.at,
            )
            .await?
            .ok_or_else(|| {
                AppError::PricingNotFound(format!("{} {}", extension, request.operation))
            })?;

        let currency = request
            .currency
            .as_deref()
            .map(normalize_currency)
            .unwrap_or_else(|| unit.currency.clone());

        let rate = self
            .converter
            .rate(&unit.currency, &currency, request.at)
            .await?;

        let years = Decimal::from(request.years);
        let quote = PriceQuote {
            extension,
            tld_id: tld.id,
            operation: request.operation,
            years: request.years,
            currency,
            unit_list_price: round_money(unit.list_price * rate),
            unit_price: round_money(unit.price * rate),
            total: round_money(unit.price * years * rate),
            discount_id: unit.discount_id,
            exchange_rate: rate,
            quoted_at: request.at,
        };

        debug!(
            "Quoted {} x{} = {} {}",
            quote.extension, quote.years, quote.total, quote.currency
        );
        Ok(quote)
    }
}
