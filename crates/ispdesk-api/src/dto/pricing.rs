//! Pricing DTOs

use chrono::{DateTime, Utc};
use ispdesk_core::models::{
    NewCostPricing, NewDiscount, NewSalesPricing, PriceSet, PricingOperation,
    RegistrarTldCostPricing, TldSalesPricing,
};
use ispdesk_core::{AppError, AppResult};
use ispdesk_services::constants::DEFAULT_HISTORY_LIMIT;
use ispdesk_services::QuoteRequest;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::common::deserialize_number_from_string;

/// Parse an operation name from a request
pub fn parse_operation(value: &str) -> AppResult<PricingOperation> {
    PricingOperation::from_str(value)
        .ok_or_else(|| AppError::InvalidInput(format!("Unknown operation: {}", value)))
}

fn default_operation() -> String {
    PricingOperation::Registration.as_str().to_string()
}

fn default_years() -> u32 {
    1
}

fn default_history_limit() -> i64 {
    DEFAULT_HISTORY_LIMIT
}

// ==================== Quotes ====================

/// Query parameters for a price quote
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct QuoteQuery {
    /// TLD extension, with or without the leading dot
    #[validate(length(min = 1, max = 63))]
    pub tld: String,

    #[serde(default = "default_operation")]
    pub operation: String,

    #[serde(default = "default_years")]
    #[validate(range(min = 1))]
    pub years: u32,

    /// Reseller company whose discounts apply
    pub company_id: Option<i32>,

    /// Currency to quote in (defaults to the sales price currency)
    #[validate(length(equal = 3))]
    pub currency: Option<String>,

    /// Quote as of this instant (defaults to now)
    pub at: Option<DateTime<Utc>>,
}

impl QuoteQuery {
    /// Convert into a calculator request
    pub fn into_request(self, now: DateTime<Utc>) -> AppResult<QuoteRequest> {
        Ok(QuoteRequest {
            operation: parse_operation(&self.operation)?,
            extension: self.tld,
            years: self.years,
            reseller_company_id: self.company_id,
            currency: self.currency,
            at: self.at.unwrap_or(now),
        })
    }
}

// ==================== Margins ====================

/// Query parameters for margin analysis
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarginQuery {
    pub company_id: Option<i32>,

    /// Only negative and low margins, worst first
    #[serde(default)]
    pub flagged_only: bool,

    pub at: Option<DateTime<Utc>>,
}

/// Query parameters for registrar candidates
#[derive(Debug, Clone, Deserialize)]
pub struct CandidateQuery {
    #[serde(default = "default_operation")]
    pub operation: String,

    pub at: Option<DateTime<Utc>>,
}

// ==================== Pricing windows ====================

/// Query parameters for current/future/history lookups
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct PricingWindowQuery {
    pub at: Option<DateTime<Utc>>,

    /// Maximum history rows
    #[serde(
        default = "default_history_limit",
        deserialize_with = "deserialize_number_from_string"
    )]
    #[validate(range(min = 1, max = 500))]
    pub limit: i64,
}

impl Default for PricingWindowQuery {
    fn default() -> Self {
        Self {
            at: None,
            limit: default_history_limit(),
        }
    }
}

/// Current, scheduled and past rows of one pricing series
#[derive(Debug, Clone, Serialize)]
pub struct PricingWindows<T> {
    pub current: Option<T>,
    pub future: Vec<T>,
    pub history: Vec<T>,
}

/// Cost price row response
#[derive(Debug, Clone, Serialize)]
pub struct CostPricingResponse {
    pub id: i64,
    pub registrar_tld_id: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub registration_cost: Decimal,
    pub renewal_cost: Decimal,
    pub transfer_cost: Decimal,
    pub currency: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<RegistrarTldCostPricing> for CostPricingResponse {
    fn from(row: RegistrarTldCostPricing) -> Self {
        Self {
            id: row.id,
            registrar_tld_id: row.registrar_tld_id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            registration_cost: row.costs.registration,
            renewal_cost: row.costs.renewal,
            transfer_cost: row.costs.transfer,
            currency: row.currency,
            is_active: row.is_active,
            notes: row.notes,
        }
    }
}

/// Sales price row response
#[derive(Debug, Clone, Serialize)]
pub struct SalesPricingResponse {
    pub id: i64,
    pub tld_id: i32,
    pub effective_from: DateTime<Utc>,
    pub effective_to: Option<DateTime<Utc>>,
    pub registration_price: Decimal,
    pub renewal_price: Decimal,
    pub transfer_price: Decimal,
    pub currency: String,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl From<TldSalesPricing> for SalesPricingResponse {
    fn from(row: TldSalesPricing) -> Self {
        Self {
            id: row.id,
            tld_id: row.tld_id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            registration_price: row.prices.registration,
            renewal_price: row.prices.renewal,
            transfer_price: row.prices.transfer,
            currency: row.currency,
            is_active: row.is_active,
            notes: row.notes,
        }
    }
}

// ==================== Scheduling ====================

/// Request to schedule a registrar cost price
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CostPricingRequest {
    /// Start of the new price (defaults to now)
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    pub registration_cost: Decimal,
    pub renewal_cost: Decimal,
    pub transfer_cost: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl CostPricingRequest {
    pub fn into_new_pricing(self, registrar_tld_id: i32, now: DateTime<Utc>) -> NewCostPricing {
        NewCostPricing {
            registrar_tld_id,
            effective_from: self.effective_from.unwrap_or(now),
            effective_to: self.effective_to,
            costs: PriceSet::new(
                self.registration_cost,
                self.renewal_cost,
                self.transfer_cost,
            ),
            currency: self.currency,
            notes: self.notes,
        }
    }
}

/// Request to schedule a TLD sales price
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SalesPricingRequest {
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,
    pub registration_price: Decimal,
    pub renewal_price: Decimal,
    pub transfer_price: Decimal,
    #[validate(length(equal = 3))]
    pub currency: String,
    #[validate(length(max = 500))]
    pub notes: Option<String>,
}

impl SalesPricingRequest {
    pub fn into_new_pricing(self, tld_id: i32, now: DateTime<Utc>) -> NewSalesPricing {
        NewSalesPricing {
            tld_id,
            effective_from: self.effective_from.unwrap_or(now),
            effective_to: self.effective_to,
            prices: PriceSet::new(
                self.registration_price,
                self.renewal_price,
                self.transfer_price,
            ),
            currency: self.currency,
            notes: self.notes,
        }
    }
}

/// Request to grant a reseller discount
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct DiscountRequest {
    #[validate(range(min = 1))]
    pub reseller_company_id: i32,

    #[validate(range(min = 1))]
    pub tld_id: i32,

    pub effective_from: Option<DateTime<Utc>>,
    pub effective_to: Option<DateTime<Utc>>,

    /// Percentage off, in (0, 100]
    pub discount_percentage: Option<Decimal>,

    /// Fixed amount off
    pub discount_amount: Option<Decimal>,

    /// Currency of `discount_amount`
    #[validate(length(equal = 3))]
    pub currency: Option<String>,

    /// Limit to one operation (omit for all)
    pub operation: Option<String>,
}

impl DiscountRequest {
    pub fn into_new_discount(self, now: DateTime<Utc>) -> AppResult<NewDiscount> {
        let operation = self
            .operation
            .as_deref()
            .map(parse_operation)
            .transpose()?;

        Ok(NewDiscount {
            reseller_company_id: self.reseller_company_id,
            tld_id: self.tld_id,
            effective_from: self.effective_from.unwrap_or(now),
            effective_to: self.effective_to,
            discount_percentage: self.discount_percentage,
            discount_amount: self.discount_amount,
            currency: self.currency,
            operation,
        })
    }
}
