//! Effective-dated pricing store
//!
//! Lookups and scheduling for registrar cost pricing, TLD sales pricing and
//! reseller discounts, plus archival of long-closed rows.
//!
//! At most one row per key is current at any instant. Scheduling a row that
//! starts inside an open-ended row closes that row one second before the new
//! one starts; any other overlap is rejected.

use chrono::{DateTime, Duration, Utc};
use ispdesk_core::{
    config::PricingConfig,
    models::{
        close_before, normalize_currency, normalize_extension, tld::is_valid_currency,
        ArchiveStats, EffectiveDated, NewCostPricing, NewDiscount, NewPriceChangeLog,
        NewSalesPricing, PriceSet, RegistrarTldCostPricing, ResellerTldDiscount,
        SupersedeCostPricing, SupersedeSalesPricing, TldSalesPricing,
    },
    AppError, AppResult,
};
use ispdesk_core::models::sync::CHANGE_SOURCE_MANUAL;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::constants::MAX_DISCOUNT_PERCENT;
use crate::context::ServiceContext;

/// Cost/sales pricing store
pub struct TldPricingService {
    ctx: Arc<ServiceContext>,
    config: PricingConfig,
}

impl TldPricingService {
    /// Create a new pricing service
    pub fn new(ctx: Arc<ServiceContext>, config: PricingConfig) -> Self {
        Self { ctx, config }
    }

    // ==================== Cost lookups ====================

    /// Cost row current for an offering at `at`
    #[instrument(skip(self))]
    pub async fn current_cost(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<RegistrarTldCostPricing>> {
        self.ctx.cost_pricing.find_current(registrar_tld_id, at).await
    }

    /// Cost rows starting after `at`, earliest first
    #[instrument(skip(self))]
    pub async fn future_costs(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        self.ctx.cost_pricing.find_future(registrar_tld_id, at).await
    }

    #[instrument(skip(self))]
    pub async fn cost_history(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        self.ctx
            .cost_pricing
            .find_history(registrar_tld_id, limit)
            .await
    }

    // ==================== Sales lookups ====================

    /// Sales row current for a TLD at `at`
    #[instrument(skip(self))]
    pub async fn current_sales(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<TldSalesPricing>> {
        self.ctx.sales_pricing.find_current(tld_id, at).await
    }

    /// Sales rows starting after `at`, earliest first
    #[instrument(skip(self))]
    pub async fn future_sales(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<TldSalesPricing>> {
        self.ctx.sales_pricing.find_future(tld_id, at).await
    }

    #[instrument(skip(self))]
    pub async fn sales_history(&self, tld_id: i32, limit: i64) -> AppResult<Vec<TldSalesPricing>> {
        self.ctx.sales_pricing.find_history(tld_id, limit).await
    }

    /// Sales row current at `at` for a TLD given by extension
    ///
    /// # Errors
    ///
    /// Returns `AppError::TldNotFound` if no TLD has this extension
    #[instrument(skip(self))]
    pub async fn current_sales_by_extension(
        &self,
        extension: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<TldSalesPricing>> {
        let normalized = normalize_extension(extension);
        let tld = self
            .ctx
            .tlds
            .find_by_extension(&normalized)
            .await?
            .ok_or_else(|| AppError::TldNotFound(normalized.clone()))?;

        self.ctx.sales_pricing.find_current(tld.id, at).await
    }

    // ==================== Scheduling ====================

    /// Schedule a registrar cost row, closing the open-ended row it replaces
    pub async fn schedule_cost_pricing(
        &self,
        pricing: NewCostPricing,
    ) -> AppResult<RegistrarTldCostPricing> {
        self.schedule_cost_pricing_at(pricing, Utc::now()).await
    }

    #[instrument(skip(self, pricing), fields(registrar_tld_id = pricing.registrar_tld_id))]
    pub async fn schedule_cost_pricing_at(
        &self,
        mut pricing: NewCostPricing,
        now: DateTime<Utc>,
    ) -> AppResult<RegistrarTldCostPricing> {
        pricing.currency = validate_window_and_prices(
            &mut pricing.costs,
            &pricing.currency,
            pricing.effective_from,
            pricing.effective_to,
        )?;

        self.ctx
            .tlds
            .find_offering(pricing.registrar_tld_id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!("registrar_tld {}", pricing.registrar_tld_id))
            })?;

        let overlapping = self
            .ctx
            .cost_pricing
            .find_overlapping(
                pricing.registrar_tld_id,
                pricing.effective_from,
                pricing.effective_to,
            )
            .await?;

        let key = format!("registrar_tld:{}", pricing.registrar_tld_id);
        let replaced = plan_supersede(&overlapping, |r| r.id, pricing.effective_from, &key)?;
        let previous = replaced.map(|row| (row.id, close_before(pricing.effective_from)));

        let change_log = NewPriceChangeLog {
            registrar_tld_id: pricing.registrar_tld_id,
            download_session_id: None,
            old_costs: replaced.map(|row| row.costs),
            new_costs: pricing.costs,
            old_currency: replaced.map(|row| row.currency.clone()),
            new_currency: pricing.currency.clone(),
            change_source: CHANGE_SOURCE_MANUAL.to_string(),
            changed_at: now,
        };

        let created = self
            .ctx
            .cost_pricing
            .supersede(&SupersedeCostPricing {
                previous,
                new: pricing,
                change_log,
            })
            .await?;

        info!(
            "Scheduled cost pricing {} for {} from {}{}",
            created.id,
            key,
            created.effective_from,
            previous
                .map(|(id, _)| format!(" (closed {})", id))
                .unwrap_or_default()
        );

        Ok(created)
    }

    /// Schedule a TLD sales row, closing the open-ended row it replaces
    #[instrument(skip(self, pricing), fields(tld_id = pricing.tld_id))]
    pub async fn schedule_sales_pricing(
        &self,
        mut pricing: NewSalesPricing,
    ) -> AppResult<TldSalesPricing> {
        pricing.currency = validate_window_and_prices(
            &mut pricing.prices,
            &pricing.currency,
            pricing.effective_from,
            pricing.effective_to,
        )?;

        self.ctx
            .tlds
            .find_by_id(pricing.tld_id)
            .await?
            .ok_or_else(|| AppError::TldNotFound(format!("id {}", pricing.tld_id)))?;

        let overlapping = self
            .ctx
            .sales_pricing
            .find_overlapping(pricing.tld_id, pricing.effective_from, pricing.effective_to)
            .await?;

        let key = format!("tld:{}", pricing.tld_id);
        let previous = plan_supersede(&overlapping, |r| r.id, pricing.effective_from, &key)?
            .map(|row| (row.id, close_before(pricing.effective_from)));

        let created = self
            .ctx
            .sales_pricing
            .supersede(&SupersedeSalesPricing {
                previous,
                new: pricing,
            })
            .await?;

        info!(
            "Scheduled sales pricing {} for {} from {}",
            created.id, key, created.effective_from
        );

        Ok(created)
    }

    /// Schedule a reseller discount
    ///
    /// # Errors
    ///
    /// - `AppError::Validation` if neither a percentage in (0, 100] nor a
    ///   positive amount is given
    /// - `AppError::OverlappingPricing` if a discount for the same company,
    ///   TLD and operation overlaps the window
    #[instrument(skip(self, discount), fields(company = discount.reseller_company_id, tld_id = discount.tld_id))]
    pub async fn schedule_discount(
        &self,
        mut discount: NewDiscount,
    ) -> AppResult<ResellerTldDiscount> {
        validate_discount(&mut discount)?;

        self.ctx
            .tlds
            .find_by_id(discount.tld_id)
            .await?
            .ok_or_else(|| AppError::TldNotFound(format!("id {}", discount.tld_id)))?;

        let overlapping = self
            .ctx
            .discounts
            .find_overlapping(
                discount.reseller_company_id,
                discount.tld_id,
                discount.operation,
                discount.effective_from,
                discount.effective_to,
            )
            .await?;

        if let Some(existing) = overlapping.first() {
            let key = format!(
                "discount:{}:{}:{}",
                discount.reseller_company_id,
                discount.tld_id,
                discount.operation.map_or("all", |op| op.as_str())
            );
            warn!("Discount window overlaps row {} for {}", existing.id, key);
            return Err(AppError::OverlappingPricing {
                key,
                existing_id: existing.id,
            });
        }

        let created = self.ctx.discounts.insert(&discount).await?;
        info!("Scheduled discount {}", created.id);
        Ok(created)
    }

    // ==================== Archival ====================

    /// Move rows closed more than `archive_after_days` ago into the archive
    pub async fn archive_closed(&self) -> AppResult<ArchiveStats> {
        self.archive_closed_at(Utc::now()).await
    }

    #[instrument(skip(self))]
    pub async fn archive_closed_at(&self, now: DateTime<Utc>) -> AppResult<ArchiveStats> {
        if self.config.archive_after_days < 0 {
            error!(
                "Refusing to archive with negative retention: {} days",
                self.config.archive_after_days
            );
            return Err(AppError::Config(
                "pricing.archive_after_days must not be negative".to_string(),
            ));
        }

        let cutoff = Duration::try_days(self.config.archive_after_days)
            .and_then(|retention| now.checked_sub_signed(retention))
            .ok_or_else(|| {
                error!(
                    "Retention of {} days reaches outside the calendar",
                    self.config.archive_after_days
                );
                AppError::Config(format!(
                    "pricing.archive_after_days {} is out of range",
                    self.config.archive_after_days
                ))
            })?;
        debug!("Archiving pricing rows closed before {}", cutoff);

        let stats = ArchiveStats {
            cost_rows: self.ctx.cost_pricing.archive_closed_before(cutoff).await?,
            sales_rows: self.ctx.sales_pricing.archive_closed_before(cutoff).await?,
        };

        info!(
            "Archived {} cost rows and {} sales rows",
            stats.cost_rows, stats.sales_rows
        );
        Ok(stats)
    }
}

/// Validate a new pricing row, rounding `prices` to the stored precision
///
/// Returns the normalized currency.
fn validate_window_and_prices(
    prices: &mut PriceSet,
    currency: &str,
    from: DateTime<Utc>,
    to: Option<DateTime<Utc>>,
) -> AppResult<String> {
    if !prices.is_non_negative() {
        return Err(AppError::Validation("Prices must not be negative".to_string()));
    }

    *prices = prices.to_stored_scale().ok_or_else(|| {
        AppError::Validation(format!("Prices {:?} exceed the storable range", prices))
    })?;

    let currency = normalize_currency(currency);
    if !is_valid_currency(&currency) {
        return Err(AppError::Validation(format!(
            "Invalid currency code '{}'",
            currency
        )));
    }

    if let Some(to) = to {
        if to < from {
            return Err(AppError::Validation(format!(
                "effective_to {} is before effective_from {}",
                to, from
            )));
        }
    }

    Ok(currency)
}

fn validate_discount(discount: &mut NewDiscount) -> AppResult<()> {
    if discount.discount_percentage.is_none() && discount.discount_amount.is_none() {
        return Err(AppError::Validation(
            "A discount needs a percentage or an amount".to_string(),
        ));
    }

    if let Some(pct) = discount.discount_percentage {
        if pct <= Decimal::ZERO || pct > MAX_DISCOUNT_PERCENT {
            return Err(AppError::Validation(format!(
                "Discount percentage {} is outside (0, {}]",
                pct, MAX_DISCOUNT_PERCENT
            )));
        }
    }

    if let Some(amount) = discount.discount_amount {
        if amount <= Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Discount amount {} must be positive",
                amount
            )));
        }
    }

    if let Some(currency) = discount.currency.as_deref() {
        let normalized = normalize_currency(currency);
        if !is_valid_currency(&normalized) {
            return Err(AppError::Validation(format!(
                "Invalid currency code '{}'",
                normalized
            )));
        }
        discount.currency = Some(normalized);
    }

    if let Some(to) = discount.effective_to {
        if to < discount.effective_from {
            return Err(AppError::Validation(format!(
                "effective_to {} is before effective_from {}",
                to, discount.effective_from
            )));
        }
    }

    Ok(())
}

/// Decide which overlapping row a new window starting at `new_from` replaces
///
/// Only an open-ended row starting before `new_from` can be closed; any
/// other overlap is an error.
fn plan_supersede<'a, T: EffectiveDated>(
    overlapping: &'a [T],
    id_of: impl Fn(&T) -> i64,
    new_from: DateTime<Utc>,
    key: &str,
) -> AppResult<Option<&'a T>> {
    let mut replaced: Option<&T> = None;

    for row in overlapping {
        let closable = row.is_open_ended() && close_before(new_from) >= row.effective_from();

        if closable && replaced.is_none() {
            replaced = Some(row);
            continue;
        }

        warn!(
            "New window from {} overlaps row {} for {}",
            new_from,
            id_of(row),
            key
        );
        return Err(AppError::OverlappingPricing {
            key: key.to_string(),
            existing_id: id_of(row),
        });
    }

    Ok(replaced)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{prices, ts, InMemoryStore};
    use ispdesk_core::models::PricingOperation;
    use ispdesk_core::traits::CostPricingRepository;
    use rust_decimal_macros::dec;

    async fn setup() -> (Arc<InMemoryStore>, TldPricingService) {
        let store = InMemoryStore::new();
        store.add_registrar(1, "acme", true).await;
        store.add_tld(1, "com").await;
        store.add_offering(10, 1, 1, "com").await;
        let service = TldPricingService::new(store.context(), PricingConfig::default());
        (store, service)
    }

    fn new_cost(from: i64, to: Option<i64>, registration: Decimal) -> NewCostPricing {
        NewCostPricing {
            registrar_tld_id: 10,
            effective_from: ts(from),
            effective_to: to.map(ts),
            costs: prices(registration, dec!(9.00), dec!(7.00)),
            currency: "usd".to_string(),
            notes: None,
        }
    }

    fn new_sales(from: i64, to: Option<i64>) -> NewSalesPricing {
        NewSalesPricing {
            tld_id: 1,
            effective_from: ts(from),
            effective_to: to.map(ts),
            prices: prices(dec!(12.99), dec!(14.99), dec!(10.99)),
            currency: "USD".to_string(),
            notes: None,
        }
    }

    fn new_discount(from: i64, pct: Option<Decimal>, amount: Option<Decimal>) -> NewDiscount {
        NewDiscount {
            reseller_company_id: 3,
            tld_id: 1,
            effective_from: ts(from),
            effective_to: None,
            discount_percentage: pct,
            discount_amount: amount,
            currency: None,
            operation: None,
        }
    }

    #[tokio::test]
    async fn test_schedule_first_cost_row() {
        let (store, service) = setup().await;

        let created = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(8.00)), ts(0))
            .await
            .unwrap();

        assert_eq!(created.currency, "USD");
        let logs = store.change_logs.read().await;
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].change_source, CHANGE_SOURCE_MANUAL);
        assert!(logs[0].old_registration_price.is_none());
    }

    #[tokio::test]
    async fn test_schedule_closes_open_ended_row_one_second_before() {
        let (store, service) = setup().await;
        let first = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(8.00)), ts(0))
            .await
            .unwrap();

        let second = service
            .schedule_cost_pricing_at(new_cost(3600, None, dec!(8.50)), ts(10))
            .await
            .unwrap();

        let closed = store.cost(first.id).await.unwrap();
        assert_eq!(closed.effective_to, Some(ts(3599)));
        assert_eq!(
            closed.effective_to.unwrap() + Duration::seconds(1),
            second.effective_from
        );

        assert_eq!(
            service.current_cost(10, ts(3599)).await.unwrap().unwrap().id,
            first.id
        );
        assert_eq!(
            service.current_cost(10, ts(3600)).await.unwrap().unwrap().id,
            second.id
        );

        let future = service.future_costs(10, ts(100)).await.unwrap();
        assert_eq!(future.len(), 1);
        assert_eq!(future[0].id, second.id);

        let logs = store.change_logs.read().await;
        assert_eq!(logs[1].old_registration_price, Some(dec!(8.00)));
        assert_eq!(logs[1].new_registration_price, dec!(8.50));
    }

    #[tokio::test]
    async fn test_overlap_with_bounded_row_is_rejected() {
        let (store, service) = setup().await;
        let existing = store
            .add_cost(10, ts(0), Some(ts(1000)), prices(dec!(1), dec!(1), dec!(1)), "USD")
            .await;

        let result = service
            .schedule_cost_pricing_at(new_cost(500, None, dec!(2.00)), ts(0))
            .await;

        assert!(matches!(
            result,
            Err(AppError::OverlappingPricing { existing_id, .. }) if existing_id == existing
        ));
    }

    #[tokio::test]
    async fn test_same_start_as_open_ended_row_is_rejected() {
        let (_store, service) = setup().await;
        service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(8.00)), ts(0))
            .await
            .unwrap();

        let result = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(9.00)), ts(0))
            .await;
        assert!(matches!(result, Err(AppError::OverlappingPricing { .. })));
    }

    /// Cost repository whose overlap lookup returns rows read earlier
    struct StaleCostView {
        inner: Arc<InMemoryStore>,
        seen: Vec<RegistrarTldCostPricing>,
    }

    #[async_trait::async_trait]
    impl CostPricingRepository for StaleCostView {
        async fn find_current(
            &self,
            registrar_tld_id: i32,
            at: DateTime<Utc>,
        ) -> AppResult<Option<RegistrarTldCostPricing>> {
            self.inner.find_current(registrar_tld_id, at).await
        }

        async fn find_future(
            &self,
            registrar_tld_id: i32,
            at: DateTime<Utc>,
        ) -> AppResult<Vec<RegistrarTldCostPricing>> {
            self.inner.find_future(registrar_tld_id, at).await
        }

        async fn find_overlapping(
            &self,
            _registrar_tld_id: i32,
            _from: DateTime<Utc>,
            _to: Option<DateTime<Utc>>,
        ) -> AppResult<Vec<RegistrarTldCostPricing>> {
            Ok(self.seen.clone())
        }

        async fn find_history(
            &self,
            registrar_tld_id: i32,
            limit: i64,
        ) -> AppResult<Vec<RegistrarTldCostPricing>> {
            self.inner.find_history(registrar_tld_id, limit).await
        }

        async fn insert(&self, pricing: &NewCostPricing) -> AppResult<RegistrarTldCostPricing> {
            self.inner.insert(pricing).await
        }

        async fn close(&self, id: i64, effective_to: DateTime<Utc>) -> AppResult<()> {
            self.inner.close(id, effective_to).await
        }

        async fn supersede(
            &self,
            change: &SupersedeCostPricing,
        ) -> AppResult<RegistrarTldCostPricing> {
            self.inner.supersede(change).await
        }

        async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
            self.inner.archive_closed_before(cutoff).await
        }
    }

    fn service_with_stale_view(
        store: &Arc<InMemoryStore>,
        seen: Vec<RegistrarTldCostPricing>,
    ) -> TldPricingService {
        let ctx = ServiceContext {
            registrars: store.clone(),
            tlds: store.clone(),
            cost_pricing: Arc::new(StaleCostView {
                inner: store.clone(),
                seen,
            }),
            sales_pricing: store.clone(),
            discounts: store.clone(),
            preferences: store.clone(),
            exchange_rates: store.clone(),
            sync_audit: store.clone(),
            emails: store.clone(),
        };
        TldPricingService::new(Arc::new(ctx), PricingConfig::default())
    }

    #[tokio::test]
    async fn test_write_planned_from_stale_rows_is_rejected() {
        let (store, service) = setup().await;
        let first = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(8.00)), ts(0))
            .await
            .unwrap();
        let seen_open = store.costs_for(10).await;

        // A concurrent writer replaces the open row first
        let winner = service
            .schedule_cost_pricing_at(new_cost(1800, None, dec!(8.25)), ts(5))
            .await
            .unwrap();

        let stale = service_with_stale_view(&store, seen_open);
        let result = stale
            .schedule_cost_pricing_at(new_cost(3600, None, dec!(8.50)), ts(5))
            .await;
        assert!(matches!(
            result,
            Err(AppError::OverlappingPricing { existing_id, .. }) if existing_id == first.id
        ));

        let blind = service_with_stale_view(&store, Vec::new());
        let result = blind
            .schedule_cost_pricing_at(new_cost(3600, None, dec!(8.50)), ts(5))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));

        let rows = store.costs_for(10).await;
        assert_eq!(rows.len(), 2);
        assert_eq!(store.cost(first.id).await.unwrap().effective_to, Some(ts(1799)));
        let open: Vec<_> = rows.iter().filter(|r| r.effective_to.is_none()).collect();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, winner.id);
        assert_eq!(store.change_logs.read().await.len(), 2);
    }

    #[tokio::test]
    async fn test_cost_validation() {
        let (_store, service) = setup().await;

        let negative = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(-1)), ts(0))
            .await;
        assert!(matches!(negative, Err(AppError::Validation(_))));

        let mut bad_currency = new_cost(0, None, dec!(1));
        bad_currency.currency = "US".to_string();
        let result = service.schedule_cost_pricing_at(bad_currency, ts(0)).await;
        assert!(matches!(result, Err(AppError::Validation(_))));

        let inverted = service
            .schedule_cost_pricing_at(new_cost(100, Some(50), dec!(1)), ts(0))
            .await;
        assert!(matches!(inverted, Err(AppError::Validation(_))));

        let mut unknown = new_cost(0, None, dec!(1));
        unknown.registrar_tld_id = 99;
        let result = service.schedule_cost_pricing_at(unknown, ts(0)).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_scheduled_prices_are_rounded_to_stored_precision() {
        let (store, service) = setup().await;

        let created = service
            .schedule_cost_pricing_at(new_cost(0, None, dec!(8.12345)), ts(0))
            .await
            .unwrap();
        assert_eq!(created.costs.registration, dec!(8.1235));
        assert_eq!(
            store.change_logs.read().await[0].new_registration_price,
            dec!(8.1235)
        );

        let oversized = service
            .schedule_cost_pricing_at(new_cost(3600, None, dec!(100000000)), ts(0))
            .await;
        assert!(matches!(oversized, Err(AppError::Validation(_))));
        assert_eq!(store.costs_for(10).await.len(), 1);
    }

    #[tokio::test]
    async fn test_sales_scheduling_and_lookup_by_extension() {
        let (store, service) = setup().await;
        let first = service.schedule_sales_pricing(new_sales(0, None)).await.unwrap();
        let second = service
            .schedule_sales_pricing(new_sales(7200, None))
            .await
            .unwrap();

        let closed = store
            .sales
            .read()
            .await
            .iter()
            .find(|s| s.id == first.id)
            .cloned()
            .unwrap();
        assert_eq!(closed.effective_to, Some(ts(7199)));

        let current = service
            .current_sales_by_extension(".COM", ts(7200))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(current.id, second.id);

        let history = service.sales_history(1, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);

        let missing = service.current_sales_by_extension("net", ts(0)).await;
        assert!(matches!(missing, Err(AppError::TldNotFound(_))));
    }

    #[tokio::test]
    async fn test_discount_validation() {
        let (_store, service) = setup().await;

        let none = service.schedule_discount(new_discount(0, None, None)).await;
        assert!(matches!(none, Err(AppError::Validation(_))));

        let zero_pct = service
            .schedule_discount(new_discount(0, Some(dec!(0)), None))
            .await;
        assert!(matches!(zero_pct, Err(AppError::Validation(_))));

        let too_big = service
            .schedule_discount(new_discount(0, Some(dec!(100.01)), None))
            .await;
        assert!(matches!(too_big, Err(AppError::Validation(_))));

        let negative_amount = service
            .schedule_discount(new_discount(0, None, Some(dec!(-2))))
            .await;
        assert!(matches!(negative_amount, Err(AppError::Validation(_))));

        let full = service
            .schedule_discount(new_discount(0, Some(dec!(100)), None))
            .await;
        assert!(full.is_ok());
    }

    #[tokio::test]
    async fn test_discount_overlap_is_per_operation() {
        let (_store, service) = setup().await;
        service
            .schedule_discount(new_discount(0, Some(dec!(10)), None))
            .await
            .unwrap();

        let clash = service
            .schedule_discount(new_discount(100, None, Some(dec!(1))))
            .await;
        assert!(matches!(clash, Err(AppError::OverlappingPricing { .. })));

        let mut renewal_only = new_discount(100, Some(dec!(15)), None);
        renewal_only.operation = Some(PricingOperation::Renewal);
        assert!(service.schedule_discount(renewal_only).await.is_ok());
    }

    #[tokio::test]
    async fn test_archive_moves_only_old_closed_rows() {
        let (store, service) = setup().await;
        let day = 86_400;
        let p = prices(dec!(1), dec!(1), dec!(1));
        store.add_cost(10, ts(0), Some(ts(day)), p, "USD").await;
        store.add_cost(10, ts(day + 1), None, p, "USD").await;
        store.add_sales(1, ts(0), Some(ts(day)), p, "USD").await;

        let too_soon = service.archive_closed_at(ts(200 * day)).await.unwrap();
        assert_eq!(too_soon, ArchiveStats::default());

        let stats = service.archive_closed_at(ts(400 * day)).await.unwrap();
        assert_eq!(stats.cost_rows, 1);
        assert_eq!(stats.sales_rows, 1);
        assert_eq!(store.costs_for(10).await.len(), 1);
        assert_eq!(store.archived_costs.read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_archive_rejects_out_of_range_retention() {
        let store = InMemoryStore::new();
        let config = PricingConfig {
            archive_after_days: i64::MAX,
            ..PricingConfig::default()
        };
        let service = TldPricingService::new(store.context(), config);

        let result = service.archive_closed_at(ts(0)).await;
        assert!(matches!(result, Err(AppError::Config(_))));

        let config = PricingConfig {
            archive_after_days: 1_000_000_000,
            ..PricingConfig::default()
        };
        let service = TldPricingService::new(store.context(), config);
        assert!(matches!(
            service.archive_closed_at(ts(0)).await,
            Err(AppError::Config(_))
        ));
    }
}
