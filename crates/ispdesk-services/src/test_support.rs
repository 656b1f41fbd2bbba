//! In-memory repository and client mocks for service tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use ispdesk_core::models::{
    EffectiveDated, EmailStatus, ExchangeRate, NewCostPricing, NewDiscount, NewEmail,
    NewPriceChangeLog, NewSalesPricing, PriceSet, PricingOperation, QueuedEmail, Registrar,
    RegistrarSelectionPreference, RegistrarTld, RegistrarTldCostPricing,
    RegistrarTldPriceChangeLog, RegistrarTldPriceDownloadSession, ResellerTldDiscount,
    SessionOutcome, SupersedeCostPricing, SupersedeSalesPricing, Tld, TldSalesPricing,
    windows_overlap,
};
use ispdesk_core::traits::{
    CostPricingRepository, DiscountRepository, EmailQueueRepository, ExchangeRateRepository,
    PreferenceRepository, PriceSyncAuditRepository, RegistrarRepository, SalesPricingRepository,
    TldRepository,
};
use ispdesk_core::{AppError, AppResult};
use ispdesk_registrar::{
    DomainAvailability, RegistrarClient, RegistrarClientFactory, RegistrarError, TldPriceInfo,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context::ServiceContext;

/// Fixed instant `secs` seconds after 2024-03-01T00:00:00Z
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::seconds(secs)
}

pub fn prices(registration: Decimal, renewal: Decimal, transfer: Decimal) -> PriceSet {
    PriceSet::new(registration, renewal, transfer)
}

// ===== InMemoryStore =====

/// Single store implementing every repository trait
#[derive(Default)]
pub struct InMemoryStore {
    next_id: AtomicI64,
    pub registrars: RwLock<Vec<Registrar>>,
    pub tlds: RwLock<Vec<Tld>>,
    pub offerings: RwLock<Vec<RegistrarTld>>,
    pub costs: RwLock<Vec<RegistrarTldCostPricing>>,
    pub sales: RwLock<Vec<TldSalesPricing>>,
    pub discounts: RwLock<Vec<ResellerTldDiscount>>,
    pub preferences: RwLock<Vec<RegistrarSelectionPreference>>,
    pub rates: RwLock<Vec<ExchangeRate>>,
    pub sessions: RwLock<Vec<RegistrarTldPriceDownloadSession>>,
    pub change_logs: RwLock<Vec<RegistrarTldPriceChangeLog>>,
    pub emails: RwLock<Vec<QueuedEmail>>,
    pub archived_costs: RwLock<Vec<RegistrarTldCostPricing>>,
    pub archived_sales: RwLock<Vec<TldSalesPricing>>,
    /// If Some, `supersede` fails with this message
    pub supersede_error: RwLock<Option<String>>,
}

impl InMemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            next_id: AtomicI64::new(1),
            ..Default::default()
        })
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Service context where every repository is this store
    pub fn context(self: &Arc<Self>) -> Arc<ServiceContext> {
        Arc::new(ServiceContext {
            registrars: self.clone(),
            tlds: self.clone(),
            cost_pricing: self.clone(),
            sales_pricing: self.clone(),
            discounts: self.clone(),
            preferences: self.clone(),
            exchange_rates: self.clone(),
            sync_audit: self.clone(),
            emails: self.clone(),
        })
    }

    pub async fn add_registrar(&self, id: i32, code: &str, is_active: bool) {
        self.registrars.write().await.push(Registrar {
            id,
            code: code.to_string(),
            name: code.to_uppercase(),
            api_url: None,
            is_active,
            created_at: ts(0),
            updated_at: ts(0),
        });
    }

    pub async fn add_tld(&self, id: i32, extension: &str) {
        self.tlds.write().await.push(Tld {
            id,
            extension: extension.to_string(),
            description: None,
            is_active: true,
            created_at: ts(0),
            updated_at: ts(0),
        });
    }

    pub async fn add_offering(&self, id: i32, registrar_id: i32, tld_id: i32, extension: &str) {
        self.offerings.write().await.push(RegistrarTld {
            id,
            registrar_id,
            tld_id,
            extension: extension.to_string(),
            is_active: true,
        });
    }

    pub async fn add_cost(
        &self,
        registrar_tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
        costs: PriceSet,
        currency: &str,
    ) -> i64 {
        let id = self.next_id();
        self.costs.write().await.push(RegistrarTldCostPricing {
            id,
            registrar_tld_id,
            effective_from: from,
            effective_to: to,
            costs,
            currency: currency.to_string(),
            is_active: true,
            notes: None,
            created_at: from,
        });
        id
    }

    pub async fn add_sales(
        &self,
        tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
        prices: PriceSet,
        currency: &str,
    ) -> i64 {
        let id = self.next_id();
        self.sales.write().await.push(TldSalesPricing {
            id,
            tld_id,
            effective_from: from,
            effective_to: to,
            prices,
            currency: currency.to_string(),
            is_active: true,
            notes: None,
            created_at: from,
        });
        id
    }

    pub async fn add_discount(&self, discount: ResellerTldDiscount) {
        self.discounts.write().await.push(discount);
    }

    pub async fn add_preference(&self, registrar_id: i32, priority: i32) {
        let id = self.next_id() as i32;
        self.preferences
            .write()
            .await
            .push(RegistrarSelectionPreference {
                id,
                registrar_id,
                priority,
                is_active: true,
            });
    }

    pub async fn add_rate(&self, base: &str, target: &str, rate: Decimal) {
        let id = self.next_id();
        self.rates.write().await.push(ExchangeRate {
            id,
            base_currency: base.to_string(),
            target_currency: target.to_string(),
            rate,
            effective_from: ts(-1_000_000),
            effective_to: None,
        });
    }

    pub async fn cost(&self, id: i64) -> Option<RegistrarTldCostPricing> {
        self.costs.read().await.iter().find(|c| c.id == id).cloned()
    }

    pub async fn costs_for(&self, registrar_tld_id: i32) -> Vec<RegistrarTldCostPricing> {
        let mut rows: Vec<_> = self
            .costs
            .read()
            .await
            .iter()
            .filter(|c| c.registrar_tld_id == registrar_tld_id)
            .cloned()
            .collect();
        rows.sort_by_key(|c| c.effective_from);
        rows
    }

    fn build_cost(&self, new: &NewCostPricing) -> RegistrarTldCostPricing {
        RegistrarTldCostPricing {
            id: self.next_id(),
            registrar_tld_id: new.registrar_tld_id,
            effective_from: new.effective_from,
            effective_to: new.effective_to,
            costs: new.costs,
            currency: new.currency.clone(),
            is_active: true,
            notes: new.notes.clone(),
            created_at: new.effective_from,
        }
    }

    fn build_sales(&self, new: &NewSalesPricing) -> TldSalesPricing {
        TldSalesPricing {
            id: self.next_id(),
            tld_id: new.tld_id,
            effective_from: new.effective_from,
            effective_to: new.effective_to,
            prices: new.prices,
            currency: new.currency.clone(),
            is_active: true,
            notes: new.notes.clone(),
            created_at: new.effective_from,
        }
    }

    fn build_change_log(&self, log: &NewPriceChangeLog) -> RegistrarTldPriceChangeLog {
        RegistrarTldPriceChangeLog {
            id: self.next_id(),
            registrar_tld_id: log.registrar_tld_id,
            download_session_id: log.download_session_id,
            old_registration_price: log.old_costs.map(|c| c.registration),
            new_registration_price: log.new_costs.registration,
            old_renewal_price: log.old_costs.map(|c| c.renewal),
            new_renewal_price: log.new_costs.renewal,
            old_transfer_price: log.old_costs.map(|c| c.transfer),
            new_transfer_price: log.new_costs.transfer,
            old_currency: log.old_currency.clone(),
            new_currency: log.new_currency.clone(),
            change_source: log.change_source.clone(),
            changed_at: log.changed_at,
        }
    }
}

fn current_of<T: EffectiveDated + Clone>(
    rows: impl Iterator<Item = T>,
    at: DateTime<Utc>,
) -> Option<T> {
    rows.filter(|r| r.is_current_at(at))
        .max_by_key(|r| r.effective_from())
}

#[async_trait]
impl RegistrarRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Registrar>> {
        Ok(self.registrars.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> AppResult<Option<Registrar>> {
        Ok(self
            .registrars
            .read()
            .await
            .iter()
            .find(|r| r.code.eq_ignore_ascii_case(code))
            .cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<Registrar>> {
        let mut rows: Vec<_> = self
            .registrars
            .read()
            .await
            .iter()
            .filter(|r| r.is_active)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.id);
        Ok(rows)
    }
}

#[async_trait]
impl TldRepository for InMemoryStore {
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Tld>> {
        Ok(self.tlds.read().await.iter().find(|t| t.id == id).cloned())
    }

    async fn find_by_extension(&self, extension: &str) -> AppResult<Option<Tld>> {
        let normalized = ispdesk_core::models::normalize_extension(extension);
        Ok(self
            .tlds
            .read()
            .await
            .iter()
            .find(|t| t.extension == normalized)
            .cloned())
    }

    async fn list_active(&self) -> AppResult<Vec<Tld>> {
        Ok(self
            .tlds
            .read()
            .await
            .iter()
            .filter(|t| t.is_active)
            .cloned()
            .collect())
    }

    async fn find_offering(&self, registrar_tld_id: i32) -> AppResult<Option<RegistrarTld>> {
        Ok(self
            .offerings
            .read()
            .await
            .iter()
            .find(|o| o.id == registrar_tld_id)
            .cloned())
    }

    async fn list_offerings_by_registrar(&self, registrar_id: i32) -> AppResult<Vec<RegistrarTld>> {
        Ok(self
            .offerings
            .read()
            .await
            .iter()
            .filter(|o| o.registrar_id == registrar_id && o.is_active)
            .cloned()
            .collect())
    }

    async fn list_offerings_by_tld(&self, tld_id: i32) -> AppResult<Vec<RegistrarTld>> {
        Ok(self
            .offerings
            .read()
            .await
            .iter()
            .filter(|o| o.tld_id == tld_id && o.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CostPricingRepository for InMemoryStore {
    async fn find_current(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<RegistrarTldCostPricing>> {
        let rows = self.costs_for(registrar_tld_id).await;
        Ok(current_of(rows.into_iter(), at))
    }

    async fn find_future(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        Ok(self
            .costs_for(registrar_tld_id)
            .await
            .into_iter()
            .filter(|c| c.is_future_at(at))
            .collect())
    }

    async fn find_overlapping(
        &self,
        registrar_tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        Ok(self
            .costs_for(registrar_tld_id)
            .await
            .into_iter()
            .filter(|c| c.is_active && c.overlaps(from, to))
            .collect())
    }

    async fn find_history(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        let mut rows = self.costs_for(registrar_tld_id).await;
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert(&self, pricing: &NewCostPricing) -> AppResult<RegistrarTldCostPricing> {
        let row = self.build_cost(pricing);
        self.costs.write().await.push(row.clone());
        Ok(row)
    }

    async fn close(&self, id: i64, effective_to: DateTime<Utc>) -> AppResult<()> {
        let mut costs = self.costs.write().await;
        let row = costs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::PricingNotFound(format!("cost pricing {}", id)))?;
        row.effective_to = Some(effective_to);
        Ok(())
    }

    async fn supersede(
        &self,
        change: &SupersedeCostPricing,
    ) -> AppResult<RegistrarTldCostPricing> {
        if let Some(msg) = self.supersede_error.read().await.clone() {
            return Err(AppError::Database(msg));
        }

        let mut costs = self.costs.write().await;
        let new = &change.new;
        let closing = match change.previous {
            Some((previous_id, effective_to)) => Some((
                costs
                    .iter()
                    .position(|c| {
                        c.id == previous_id
                            && c.effective_from <= effective_to
                            && c.effective_to.map_or(true, |to| to > effective_to)
                    })
                    .ok_or_else(|| AppError::OverlappingPricing {
                        key: format!("registrar_tld:{}", new.registrar_tld_id),
                        existing_id: previous_id,
                    })?,
                effective_to,
            )),
            None => None,
        };
        let clashes = costs.iter().enumerate().any(|(i, c)| {
            let to = match closing {
                Some((idx, to)) if idx == i => Some(to),
                _ => c.effective_to,
            };
            c.is_active
                && c.registrar_tld_id == new.registrar_tld_id
                && windows_overlap(c.effective_from, to, new.effective_from, new.effective_to)
        });
        if clashes {
            return Err(AppError::Conflict("cost pricing window overlaps".to_string()));
        }
        if let Some((idx, to)) = closing {
            costs[idx].effective_to = Some(to);
        }

        let created = self.build_cost(&change.new);
        costs.push(created.clone());
        self.change_logs
            .write()
            .await
            .push(self.build_change_log(&change.change_log));
        Ok(created)
    }

    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut costs = self.costs.write().await;
        let (archived, kept): (Vec<_>, Vec<_>) = costs
            .drain(..)
            .partition(|c| c.effective_to.map_or(false, |to| to < cutoff));
        *costs = kept;
        let count = archived.len() as u64;
        self.archived_costs.write().await.extend(archived);
        Ok(count)
    }
}

#[async_trait]
impl SalesPricingRepository for InMemoryStore {
    async fn find_current(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<TldSalesPricing>> {
        let rows: Vec<_> = self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.tld_id == tld_id)
            .cloned()
            .collect();
        Ok(current_of(rows.into_iter(), at))
    }

    async fn find_future(&self, tld_id: i32, at: DateTime<Utc>) -> AppResult<Vec<TldSalesPricing>> {
        let mut rows: Vec<_> = self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.tld_id == tld_id && s.is_future_at(at))
            .cloned()
            .collect();
        rows.sort_by_key(|s| s.effective_from);
        Ok(rows)
    }

    async fn find_overlapping(
        &self,
        tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<TldSalesPricing>> {
        Ok(self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.tld_id == tld_id && s.is_active && s.overlaps(from, to))
            .cloned()
            .collect())
    }

    async fn find_history(&self, tld_id: i32, limit: i64) -> AppResult<Vec<TldSalesPricing>> {
        let mut rows: Vec<_> = self
            .sales
            .read()
            .await
            .iter()
            .filter(|s| s.tld_id == tld_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn insert(&self, pricing: &NewSalesPricing) -> AppResult<TldSalesPricing> {
        let row = self.build_sales(pricing);
        self.sales.write().await.push(row.clone());
        Ok(row)
    }

    async fn supersede(&self, change: &SupersedeSalesPricing) -> AppResult<TldSalesPricing> {
        let mut sales = self.sales.write().await;
        let new = &change.new;
        let closing = match change.previous {
            Some((previous_id, effective_to)) => Some((
                sales
                    .iter()
                    .position(|s| {
                        s.id == previous_id
                            && s.effective_from <= effective_to
                            && s.effective_to.map_or(true, |to| to > effective_to)
                    })
                    .ok_or_else(|| AppError::OverlappingPricing {
                        key: format!("tld:{}", new.tld_id),
                        existing_id: previous_id,
                    })?,
                effective_to,
            )),
            None => None,
        };
        let clashes = sales.iter().enumerate().any(|(i, s)| {
            let to = match closing {
                Some((idx, to)) if idx == i => Some(to),
                _ => s.effective_to,
            };
            s.is_active
                && s.tld_id == new.tld_id
                && windows_overlap(s.effective_from, to, new.effective_from, new.effective_to)
        });
        if clashes {
            return Err(AppError::Conflict("sales pricing window overlaps".to_string()));
        }
        if let Some((idx, to)) = closing {
            sales[idx].effective_to = Some(to);
        }
        let created = self.build_sales(&change.new);
        sales.push(created.clone());
        Ok(created)
    }

    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let mut sales = self.sales.write().await;
        let (archived, kept): (Vec<_>, Vec<_>) = sales
            .drain(..)
            .partition(|s| s.effective_to.map_or(false, |to| to < cutoff));
        *sales = kept;
        let count = archived.len() as u64;
        self.archived_sales.write().await.extend(archived);
        Ok(count)
    }
}

#[async_trait]
impl DiscountRepository for InMemoryStore {
    async fn find_active(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResellerTldDiscount>> {
        let mut rows: Vec<_> = self
            .discounts
            .read()
            .await
            .iter()
            .filter(|d| {
                d.reseller_company_id == reseller_company_id
                    && d.tld_id == tld_id
                    && d.is_current_at(at)
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.effective_from.cmp(&a.effective_from));
        Ok(rows)
    }

    async fn find_overlapping(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        operation: Option<PricingOperation>,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ResellerTldDiscount>> {
        Ok(self
            .discounts
            .read()
            .await
            .iter()
            .filter(|d| {
                d.reseller_company_id == reseller_company_id
                    && d.tld_id == tld_id
                    && d.operation == operation
                    && d.is_active
                    && d.overlaps(from, to)
            })
            .cloned()
            .collect())
    }

    async fn insert(&self, discount: &NewDiscount) -> AppResult<ResellerTldDiscount> {
        let row = ResellerTldDiscount {
            id: self.next_id(),
            reseller_company_id: discount.reseller_company_id,
            tld_id: discount.tld_id,
            effective_from: discount.effective_from,
            effective_to: discount.effective_to,
            discount_percentage: discount.discount_percentage,
            discount_amount: discount.discount_amount,
            currency: discount.currency.clone(),
            operation: discount.operation,
            is_active: true,
            created_at: discount.effective_from,
        };
        self.discounts.write().await.push(row.clone());
        Ok(row)
    }
}

#[async_trait]
impl PreferenceRepository for InMemoryStore {
    async fn list_active(&self) -> AppResult<Vec<RegistrarSelectionPreference>> {
        Ok(self
            .preferences
            .read()
            .await
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl ExchangeRateRepository for InMemoryStore {
    async fn find_current(
        &self,
        base: &str,
        target: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExchangeRate>> {
        let rows: Vec<_> = self
            .rates
            .read()
            .await
            .iter()
            .filter(|r| r.base_currency == base && r.target_currency == target)
            .cloned()
            .collect();
        Ok(current_of(rows.into_iter(), at))
    }
}

#[async_trait]
impl PriceSyncAuditRepository for InMemoryStore {
    async fn create_session(
        &self,
        registrar_id: i32,
        triggered_by: &str,
        started_at: DateTime<Utc>,
    ) -> AppResult<RegistrarTldPriceDownloadSession> {
        let session = RegistrarTldPriceDownloadSession {
            id: self.next_id(),
            registrar_id,
            started_at,
            completed_at: None,
            success: false,
            tlds_processed: 0,
            price_changes_detected: 0,
            error_message: None,
            triggered_by: triggered_by.to_string(),
        };
        self.sessions.write().await.push(session.clone());
        Ok(session)
    }

    async fn complete_session(
        &self,
        session_id: i64,
        outcome: &SessionOutcome,
        completed_at: DateTime<Utc>,
    ) -> AppResult<RegistrarTldPriceDownloadSession> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| AppError::NotFound(format!("download session {}", session_id)))?;
        session.completed_at = Some(completed_at);
        session.success = outcome.success;
        session.tlds_processed = outcome.tlds_processed;
        session.price_changes_detected = outcome.price_changes_detected;
        session.error_message = outcome.error_message.clone();
        Ok(session.clone())
    }

    async fn has_successful_session_on(&self, registrar_id: i32, date: NaiveDate) -> AppResult<bool> {
        Ok(self.sessions.read().await.iter().any(|s| {
            s.registrar_id == registrar_id && s.success && s.started_at.date_naive() == date
        }))
    }

    async fn list_sessions(
        &self,
        registrar_id: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<RegistrarTldPriceDownloadSession>, i64)> {
        let mut rows: Vec<_> = self
            .sessions
            .read()
            .await
            .iter()
            .filter(|s| registrar_id.map_or(true, |id| s.registrar_id == id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
        let total = rows.len() as i64;
        let page = rows
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect();
        Ok((page, total))
    }

    async fn list_change_logs(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> AppResult<Vec<RegistrarTldPriceChangeLog>> {
        let mut rows: Vec<_> = self
            .change_logs
            .read()
            .await
            .iter()
            .filter(|l| l.registrar_tld_id == registrar_tld_id)
            .cloned()
            .collect();
        rows.reverse();
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }
}

#[async_trait]
impl EmailQueueRepository for InMemoryStore {
    async fn insert(
        &self,
        email: &NewEmail,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> AppResult<QueuedEmail> {
        let row = QueuedEmail {
            id: self.next_id(),
            to_address: email.to_address.clone(),
            subject: email.subject.clone(),
            body_text: email.body_text.clone(),
            body_html: email.body_html.clone(),
            status: EmailStatus::Pending,
            attempts: 0,
            max_attempts,
            next_attempt_at: now,
            last_error: None,
            created_at: now,
            sent_at: None,
        };
        self.emails.write().await.push(row.clone());
        Ok(row)
    }

    async fn find_by_id(&self, id: i64) -> AppResult<Option<QueuedEmail>> {
        Ok(self.emails.read().await.iter().find(|e| e.id == id).cloned())
    }

    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<QueuedEmail>> {
        Ok(self
            .emails
            .read()
            .await
            .iter()
            .filter(|e| e.is_due(now))
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        claimed_until: DateTime<Utc>,
    ) -> AppResult<Option<QueuedEmail>> {
        let mut emails = self.emails.write().await;
        match emails.iter_mut().find(|e| e.id == id && e.is_due(now)) {
            Some(email) => {
                email.status = EmailStatus::Sending;
                email.next_attempt_at = claimed_until;
                Ok(Some(email.clone()))
            }
            None => Ok(None),
        }
    }

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> AppResult<()> {
        if let Some(email) = self.emails.write().await.iter_mut().find(|e| e.id == id) {
            email.status = EmailStatus::Sent;
            email.sent_at = Some(sent_at);
            email.attempts += 1;
            email.last_error = None;
        }
        Ok(())
    }

    async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        if let Some(email) = self.emails.write().await.iter_mut().find(|e| e.id == id) {
            email.status = EmailStatus::Pending;
            email.attempts = attempts;
            email.next_attempt_at = next_attempt_at;
            email.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn mark_failed(&self, id: i64, attempts: i32, error: &str) -> AppResult<()> {
        if let Some(email) = self.emails.write().await.iter_mut().find(|e| e.id == id) {
            email.status = EmailStatus::Failed;
            email.attempts = attempts;
            email.last_error = Some(error.to_string());
        }
        Ok(())
    }

    async fn count_by_status(&self, status: EmailStatus) -> AppResult<i64> {
        Ok(self
            .emails
            .read()
            .await
            .iter()
            .filter(|e| e.status == status)
            .count() as i64)
    }
}

// ===== MockRegistrarClient =====

pub struct MockRegistrarClient {
    code: String,
    tlds: Vec<TldPriceInfo>,
    fail_with: Option<String>,
}

impl MockRegistrarClient {
    pub fn new(code: &str, tlds: Vec<TldPriceInfo>) -> Self {
        Self {
            code: code.to_string(),
            tlds,
            fail_with: None,
        }
    }

    pub fn failing(code: &str, message: &str) -> Self {
        Self {
            code: code.to_string(),
            tlds: Vec::new(),
            fail_with: Some(message.to_string()),
        }
    }
}

#[async_trait]
impl RegistrarClient for MockRegistrarClient {
    fn code(&self) -> &str {
        &self.code
    }

    async fn get_supported_tlds(&self) -> Result<Vec<TldPriceInfo>, RegistrarError> {
        match &self.fail_with {
            Some(msg) => Err(RegistrarError::Connection(msg.clone())),
            None => Ok(self.tlds.clone()),
        }
    }

    async fn check_availability(&self, domain: &str) -> Result<DomainAvailability, RegistrarError> {
        Ok(DomainAvailability {
            domain: domain.to_string(),
            available: true,
            premium: false,
            price: None,
            currency: None,
        })
    }
}

pub fn price_info(
    extension: &str,
    registration: Option<Decimal>,
    renewal: Option<Decimal>,
    transfer: Option<Decimal>,
    currency: Option<&str>,
) -> TldPriceInfo {
    TldPriceInfo {
        extension: extension.to_string(),
        registration_price: registration,
        renewal_price: renewal,
        transfer_price: transfer,
        currency: currency.map(str::to_string),
    }
}

// ===== MockClientFactory =====

#[derive(Default)]
pub struct MockClientFactory {
    clients: HashMap<String, Arc<dyn RegistrarClient>>,
}

impl MockClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `client` for the registrar whose code is `registrar_code`
    pub fn with(mut self, registrar_code: &str, client: MockRegistrarClient) -> Self {
        self.clients
            .insert(registrar_code.to_ascii_lowercase(), Arc::new(client));
        self
    }
}

impl RegistrarClientFactory for MockClientFactory {
    fn client_for(&self, registrar: &Registrar) -> Result<Arc<dyn RegistrarClient>, RegistrarError> {
        self.clients
            .get(&registrar.code.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| RegistrarError::NotConfigured(registrar.code.clone()))
    }
}
