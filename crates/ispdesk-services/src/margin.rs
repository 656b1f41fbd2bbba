//! Margin analysis
//!
//! Margin is the sales price (after the reseller discount, when a company is
//! given) minus the cost of the registrar the selector would buy from. Both
//! sides are expressed in the base currency.

use chrono::{DateTime, Utc};
use ispdesk_core::{
    config::PricingConfig,
    models::{PricingOperation, Tld},
    AppError, AppResult,
};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::calculator::{round_money, PricingCalculator};
use crate::constants::PERCENT_SCALE;
use crate::context::ServiceContext;
use crate::currency::CurrencyConverter;
use crate::selection::RegistrarSelector;

/// Margin classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MarginStatus {
    /// Selling below cost
    Negative,
    /// Positive but under the configured threshold
    Low,
    Healthy,
    /// No registrar has a usable current cost
    MissingCost,
    /// No current sales price
    MissingSales,
}

impl MarginStatus {
    /// Whether the entry needs attention
    pub fn is_flagged(&self) -> bool {
        matches!(self, MarginStatus::Negative | MarginStatus::Low)
    }

    fn severity(&self) -> u8 {
        match self {
            MarginStatus::Negative => 0,
            MarginStatus::Low => 1,
            MarginStatus::MissingCost | MarginStatus::MissingSales => 2,
            MarginStatus::Healthy => 3,
        }
    }
}

/// Margin of one TLD operation
#[derive(Debug, Clone, Serialize)]
pub struct MarginAnalysis {
    pub tld_id: i32,
    pub extension: String,
    pub operation: PricingOperation,
    pub reseller_company_id: Option<i32>,
    /// Base currency all amounts are in
    pub currency: String,
    pub sales_price: Option<Decimal>,
    pub cost: Option<Decimal>,
    pub registrar_id: Option<i32>,
    pub margin: Option<Decimal>,
    pub margin_percent: Option<Decimal>,
    pub status: MarginStatus,
}

/// Classify a sales/cost pair
///
/// Returns `(margin, margin_percent, status)`. The percentage is None when
/// the sales price is zero.
pub fn classify(
    sales: Decimal,
    cost: Decimal,
    low_margin_percent: Decimal,
) -> (Decimal, Option<Decimal>, MarginStatus) {
    let margin = sales - cost;
    let percent = if sales.is_zero() {
        None
    } else {
        Some(margin / sales * Decimal::ONE_HUNDRED)
    };

    let status = if margin < Decimal::ZERO {
        MarginStatus::Negative
    } else {
        match percent {
            Some(pct) if pct >= low_margin_percent => MarginStatus::Healthy,
            _ => MarginStatus::Low,
        }
    };

    let percent = percent.map(|p| {
        p.round_dp_with_strategy(PERCENT_SCALE, RoundingStrategy::MidpointAwayFromZero)
    });
    (margin, percent, status)
}

/// Margin analyzer
pub struct MarginAnalyzer {
    ctx: Arc<ServiceContext>,
    calculator: PricingCalculator,
    selector: RegistrarSelector,
    converter: CurrencyConverter,
    config: PricingConfig,
}

impl MarginAnalyzer {
    /// Create a new margin analyzer
    pub fn new(ctx: Arc<ServiceContext>, config: PricingConfig) -> Self {
        Self {
            calculator: PricingCalculator::new(Arc::clone(&ctx), config.clone()),
            selector: RegistrarSelector::new(Arc::clone(&ctx), &config),
            converter: CurrencyConverter::new(Arc::clone(&ctx)),
            ctx,
            config,
        }
    }

    /// Margin of one TLD operation at `at`
    #[instrument(skip(self))]
    pub async fn analyze(
        &self,
        tld_id: i32,
        operation: PricingOperation,
        reseller_company_id: Option<i32>,
        at: DateTime<Utc>,
    ) -> AppResult<MarginAnalysis> {
        let tld = self
            .ctx
            .tlds
            .find_by_id(tld_id)
            .await?
            .ok_or_else(|| AppError::TldNotFound(format!("id {}", tld_id)))?;

        self.analyze_tld(&tld, operation, reseller_company_id, at)
            .await
    }

    /// Every active TLD, every operation
    #[instrument(skip(self))]
    pub async fn analyze_all(
        &self,
        reseller_company_id: Option<i32>,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<MarginAnalysis>> {
        let tlds = self.ctx.tlds.list_active().await?;
        let mut results = Vec::with_capacity(tlds.len() * PricingOperation::ALL.len());

        for tld in &tlds {
            for operation in PricingOperation::ALL {
                results.push(
                    self.analyze_tld(tld, operation, reseller_company_id, at)
                        .await?,
                );
            }
        }

        debug!("Analyzed {} TLD operations", results.len());
        Ok(results)
    }

    /// Negative and low margins, worst first
    #[instrument(skip(self))]
    pub async fn flagged(
        &self,
        reseller_company_id: Option<i32>,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<MarginAnalysis>> {
        let mut flagged: Vec<_> = self
            .analyze_all(reseller_company_id, at)
            .await?
            .into_iter()
            .filter(|a| a.status.is_flagged())
            .collect();

        flagged.sort_by(worst_first);

        if !flagged.is_empty() {
            info!("{} TLD operations with negative or low margin", flagged.len());
        }
        Ok(flagged)
    }

    async fn analyze_tld(
        &self,
        tld: &Tld,
        operation: PricingOperation,
        reseller_company_id: Option<i32>,
        at: DateTime<Utc>,
    ) -> AppResult<MarginAnalysis> {
        let base = &self.config.base_currency;
        let mut analysis = MarginAnalysis {
            tld_id: tld.id,
            extension: tld.extension.clone(),
            operation,
            reseller_company_id,
            currency: base.clone(),
            sales_price: None,
            cost: None,
            registrar_id: None,
            margin: None,
            margin_percent: None,
            status: MarginStatus::MissingSales,
        };

        let unit = self
            .calculator
            .unit_price_at(tld.id, operation, reseller_company_id, at)
            .await?;

        let sales = match unit {
            Some(unit) => match self.converter.convert(unit.price, &unit.currency, base, at).await {
                Ok(converted) => converted.amount,
                Err(AppError::ExchangeRateNotFound { from, to }) => {
                    warn!(
                        "No rate {} -> {} for sales price of {}",
                        from, to, tld.extension
                    );
                    return Ok(analysis);
                }
                Err(e) => return Err(e),
            },
            None => return Ok(analysis),
        };
        analysis.sales_price = Some(round_money(sales));

        let candidate = match self.selector.select(tld.id, operation, at).await? {
            Some(c) => c,
            None => {
                analysis.status = MarginStatus::MissingCost;
                return Ok(analysis);
            }
        };

        let (margin, percent, status) =
            classify(sales, candidate.base_cost, self.config.low_margin_percent);

        analysis.cost = Some(round_money(candidate.base_cost));
        analysis.registrar_id = Some(candidate.registrar_id);
        analysis.margin = Some(round_money(margin));
        analysis.margin_percent = percent;
        analysis.status = status;

        if status == MarginStatus::Negative {
            warn!(
                "Negative margin on {} {}: sales {} cost {}",
                tld.extension, operation, sales, candidate.base_cost
            );
        }

        Ok(analysis)
    }
}

fn worst_first(a: &MarginAnalysis, b: &MarginAnalysis) -> Ordering {
    a.status
        .severity()
        .cmp(&b.status.severity())
        .then_with(|| match (a.margin_percent, b.margin_percent) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (Some(x), Some(y)) => x.cmp(&y),
        })
        .then(a.margin.cmp(&b.margin))
        .then(a.tld_id.cmp(&b.tld_id))
}
