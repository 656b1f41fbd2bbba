//! Reseller discount resolution

use chrono::{DateTime, Utc};
use ispdesk_core::{
    models::{PricingOperation, ResellerTldDiscount},
    AppResult,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::context::ServiceContext;

/// Looks up the discount a reseller gets on a TLD
pub struct DiscountResolver {
    ctx: Arc<ServiceContext>,
}

impl DiscountResolver {
    /// Create a new discount resolver
    pub fn new(ctx: Arc<ServiceContext>) -> Self {
        Self { ctx }
    }

    /// Discount applying to `operation` on `tld_id` for a company at `at`
    ///
    /// Operation-specific rows win over all-operation rows. Among equals the
    /// latest `effective_from` wins, then the highest id.
    #[instrument(skip(self))]
    pub async fn resolve(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        operation: PricingOperation,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ResellerTldDiscount>> {
        let candidates = self
            .ctx
            .discounts
            .find_active(reseller_company_id, tld_id, at)
            .await?;

        let best = pick_discount(candidates, operation);

        match &best {
            Some(d) => debug!(
                "Discount {} applies to company {} tld {} {}",
                d.id, reseller_company_id, tld_id, operation
            ),
            None => debug!(
                "No discount for company {} tld {} {}",
                reseller_company_id, tld_id, operation
            ),
        }

        Ok(best)
    }
}

/// Pick the winning discount among rows current at the same instant
pub fn pick_discount(
    candidates: Vec<ResellerTldDiscount>,
    operation: PricingOperation,
) -> Option<ResellerTldDiscount> {
    candidates
        .into_iter()
        .filter(|d| d.is_active && d.applies_to(operation))
        .max_by(compare_precedence)
}

fn compare_precedence(a: &ResellerTldDiscount, b: &ResellerTldDiscount) -> Ordering {
    a.operation
        .is_some()
        .cmp(&b.operation.is_some())
        .then(a.effective_from.cmp(&b.effective_from))
        .then(a.id.cmp(&b.id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{ts, InMemoryStore};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn discount(
        id: i64,
        from: i64,
        operation: Option<PricingOperation>,
        pct: Decimal,
    ) -> ResellerTldDiscount {
        ResellerTldDiscount {
            id,
            reseller_company_id: 7,
            tld_id: 1,
            effective_from: ts(from),
            effective_to: None,
            discount_percentage: Some(pct),
            discount_amount: None,
            currency: None,
            operation,
            is_active: true,
            created_at: ts(from),
        }
    }

    #[test]
    fn test_operation_specific_beats_newer_generic() {
        let picked = pick_discount(
            vec![
                discount(1, 0, Some(PricingOperation::Renewal), dec!(5)),
                discount(2, 100, None, dec!(10)),
            ],
            PricingOperation::Renewal,
        )
        .unwrap();
        assert_eq!(picked.id, 1);
    }

    #[test]
    fn test_other_operation_is_ignored() {
        let picked = pick_discount(
            vec![
                discount(1, 0, Some(PricingOperation::Transfer), dec!(5)),
                discount(2, 0, None, dec!(10)),
            ],
            PricingOperation::Registration,
        )
        .unwrap();
        assert_eq!(picked.id, 2);
    }

    #[test]
    fn test_latest_start_wins_among_equals() {
        let picked = pick_discount(
            vec![discount(1, 50, None, dec!(5)), discount(2, 10, None, dec!(10))],
            PricingOperation::Registration,
        )
        .unwrap();
        assert_eq!(picked.id, 1);
    }

    #[tokio::test]
    async fn test_resolve_respects_window() {
        let store = InMemoryStore::new();
        let mut expired = discount(1, 0, None, dec!(20));
        expired.effective_to = Some(ts(99));
        store.add_discount(expired).await;
        store.add_discount(discount(2, 100, None, dec!(5))).await;

        let resolver = DiscountResolver::new(store.context());

        let early = resolver
            .resolve(7, 1, PricingOperation::Registration, ts(50))
            .await
            .unwrap();
        assert_eq!(early.map(|d| d.id), Some(1));

        let late = resolver
            .resolve(7, 1, PricingOperation::Registration, ts(150))
            .await
            .unwrap();
        assert_eq!(late.map(|d| d.id), Some(2));

        let other_company = resolver
            .resolve(8, 1, PricingOperation::Registration, ts(150))
            .await
            .unwrap();
        assert!(other_company.is_none());
    }
}
