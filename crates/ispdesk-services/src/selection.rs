//! Registrar selection
//!
//! Ranks the registrars offering a TLD: configured preference priority first
//! (higher wins, registrars without a preference count as 0), then cost in
//! the base currency (cheaper wins), then registrar id.

use chrono::{DateTime, Utc};
use ispdesk_core::{
    config::PricingConfig,
    models::PricingOperation,
    AppError, AppResult,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::context::ServiceContext;
use crate::currency::CurrencyConverter;

/// A registrar able to serve a TLD operation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrarCandidate {
    pub registrar_id: i32,
    pub registrar_code: String,
    pub registrar_tld_id: i32,
    pub cost_pricing_id: i64,
    /// Cost in the registrar's currency
    pub cost: Decimal,
    pub currency: String,
    /// Cost converted to the base currency
    pub base_cost: Decimal,
    pub priority: i32,
}

/// Picks the registrar to buy a TLD operation from
pub struct RegistrarSelector {
    ctx: Arc<ServiceContext>,
    converter: CurrencyConverter,
    base_currency: String,
}

impl RegistrarSelector {
    /// Create a new registrar selector
    pub fn new(ctx: Arc<ServiceContext>, config: &PricingConfig) -> Self {
        Self {
            converter: CurrencyConverter::new(Arc::clone(&ctx)),
            ctx,
            base_currency: config.base_currency.clone(),
        }
    }

    /// All usable registrars for the operation, best first
    #[instrument(skip(self))]
    pub async fn candidates(
        &self,
        tld_id: i32,
        operation: PricingOperation,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<RegistrarCandidate>> {
        let offerings = self.ctx.tlds.list_offerings_by_tld(tld_id).await?;

        let mut priorities: HashMap<i32, i32> = HashMap::new();
        for pref in self.ctx.preferences.list_active().await? {
            let entry = priorities.entry(pref.registrar_id).or_insert(pref.priority);
            *entry = (*entry).max(pref.priority);
        }

        let mut candidates = Vec::with_capacity(offerings.len());

        for offering in offerings.into_iter().filter(|o| o.is_active) {
            let registrar = match self.ctx.registrars.find_by_id(offering.registrar_id).await? {
                Some(r) if r.is_active => r,
                _ => {
                    debug!(
                        "Skipping offering {}: registrar {} inactive or missing",
                        offering.id, offering.registrar_id
                    );
                    continue;
                }
            };

            let cost_row = match self.ctx.cost_pricing.find_current(offering.id, at).await? {
                Some(row) => row,
                None => {
                    debug!("Skipping offering {}: no current cost", offering.id);
                    continue;
                }
            };

            let cost = cost_row.costs.price_for(operation);
            let base_cost = match self
                .converter
                .convert(cost, &cost_row.currency, &self.base_currency, at)
                .await
            {
                Ok(converted) => converted.amount,
                Err(AppError::ExchangeRateNotFound { from, to }) => {
                    warn!(
                        "Skipping registrar {} for tld {}: no rate {} -> {}",
                        registrar.code, tld_id, from, to
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };

            candidates.push(RegistrarCandidate {
                registrar_id: registrar.id,
                registrar_code: registrar.code,
                registrar_tld_id: offering.id,
                cost_pricing_id: cost_row.id,
                cost,
                currency: cost_row.currency,
                base_cost,
                priority: priorities.get(&offering.registrar_id).copied().unwrap_or(0),
            });
        }

        rank(&mut candidates);
        debug!("{} candidates for tld {} {}", candidates.len(), tld_id, operation);
        Ok(candidates)
    }

    /// Best registrar for the operation, if any
    pub async fn select(
        &self,
        tld_id: i32,
        operation: PricingOperation,
        at: DateTime<Utc>,
    ) -> AppResult<Option<RegistrarCandidate>> {
        Ok(self
            .candidates(tld_id, operation, at)
            .await?
            .into_iter()
            .next())
    }
}

fn rank(candidates: &mut [RegistrarCandidate]) {
    candidates.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.base_cost.cmp(&b.base_cost))
            .then(a.registrar_id.cmp(&b.registrar_id))
    });
}
