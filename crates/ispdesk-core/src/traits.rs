//! Common traits for repositories
//!
//! Defines abstractions for database access used by the pricing services.

use crate::error::AppError;
use crate::models::{
    EmailStatus, ExchangeRate, NewCostPricing, NewDiscount, NewEmail, NewSalesPricing,
    PricingOperation, QueuedEmail, Registrar, RegistrarSelectionPreference, RegistrarTld,
    RegistrarTldCostPricing, RegistrarTldPriceChangeLog, RegistrarTldPriceDownloadSession,
    ResellerTldDiscount, SessionOutcome, SupersedeCostPricing, SupersedeSalesPricing, Tld,
    TldSalesPricing,
};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

/// Registrar lookups
#[async_trait]
pub trait RegistrarRepository: Send + Sync {
    /// Find registrar by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Registrar>, AppError>;

    /// Find registrar by code (case-insensitive)
    async fn find_by_code(&self, code: &str) -> Result<Option<Registrar>, AppError>;

    /// List active registrars ordered by ID
    async fn list_active(&self) -> Result<Vec<Registrar>, AppError>;
}

/// TLD and registrar-TLD offering lookups
#[async_trait]
pub trait TldRepository: Send + Sync {
    /// Find TLD by ID
    async fn find_by_id(&self, id: i32) -> Result<Option<Tld>, AppError>;

    /// Find TLD by normalized extension
    async fn find_by_extension(&self, extension: &str) -> Result<Option<Tld>, AppError>;

    /// List active TLDs ordered by extension
    async fn list_active(&self) -> Result<Vec<Tld>, AppError>;

    /// Find an offering by ID
    async fn find_offering(&self, registrar_tld_id: i32)
        -> Result<Option<RegistrarTld>, AppError>;

    /// List active offerings of a registrar
    async fn list_offerings_by_registrar(
        &self,
        registrar_id: i32,
    ) -> Result<Vec<RegistrarTld>, AppError>;

    /// List active offerings of a TLD
    async fn list_offerings_by_tld(&self, tld_id: i32) -> Result<Vec<RegistrarTld>, AppError>;
}

/// Effective-dated registrar cost storage
#[async_trait]
pub trait CostPricingRepository: Send + Sync {
    /// Row current at `at`
    async fn find_current(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<RegistrarTldCostPricing>, AppError>;

    /// Rows starting after `at`, earliest first
    async fn find_future(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Vec<RegistrarTldCostPricing>, AppError>;

    /// Earliest row starting after `at`
    async fn find_next_future(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<RegistrarTldCostPricing>, AppError> {
        Ok(self.find_future(registrar_tld_id, at).await?.into_iter().next())
    }

    /// Active rows whose window intersects `[from, to]`
    async fn find_overlapping(
        &self,
        registrar_tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<RegistrarTldCostPricing>, AppError>;

    /// Most recent rows first
    async fn find_history(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> Result<Vec<RegistrarTldCostPricing>, AppError>;

    /// Insert a row
    async fn insert(&self, pricing: &NewCostPricing)
        -> Result<RegistrarTldCostPricing, AppError>;

    /// Set a row's end bound
    async fn close(&self, id: i64, effective_to: DateTime<Utc>) -> Result<(), AppError>;

    /// Close the previous row, insert the new one and log the change atomically
    async fn supersede(
        &self,
        change: &SupersedeCostPricing,
    ) -> Result<RegistrarTldCostPricing, AppError>;

    /// Move rows closed before `cutoff` to the archive table
    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Effective-dated TLD sales price storage
#[async_trait]
pub trait SalesPricingRepository: Send + Sync {
    async fn find_current(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Option<TldSalesPricing>, AppError>;

    async fn find_future(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Vec<TldSalesPricing>, AppError>;

    async fn find_overlapping(
        &self,
        tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<TldSalesPricing>, AppError>;

    async fn find_history(&self, tld_id: i32, limit: i64)
        -> Result<Vec<TldSalesPricing>, AppError>;

    async fn insert(&self, pricing: &NewSalesPricing) -> Result<TldSalesPricing, AppError>;

    /// Close the previous row and insert the new one atomically
    async fn supersede(&self, change: &SupersedeSalesPricing)
        -> Result<TldSalesPricing, AppError>;

    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> Result<u64, AppError>;
}

/// Reseller discount storage
#[async_trait]
pub trait DiscountRepository: Send + Sync {
    /// Active discounts current at `at` for the pair, newest first
    async fn find_active(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> Result<Vec<ResellerTldDiscount>, AppError>;

    /// Active discounts for the same key whose window intersects `[from, to]`
    ///
    /// `operation` None matches only all-operation rows.
    async fn find_overlapping(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        operation: Option<PricingOperation>,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<ResellerTldDiscount>, AppError>;

    async fn insert(&self, discount: &NewDiscount) -> Result<ResellerTldDiscount, AppError>;
}

/// Registrar selection preferences
#[async_trait]
pub trait PreferenceRepository: Send + Sync {
    async fn list_active(&self) -> Result<Vec<RegistrarSelectionPreference>, AppError>;
}

/// Exchange rate lookups
#[async_trait]
pub trait ExchangeRateRepository: Send + Sync {
    /// Rate from `base` to `target` current at `at`
    async fn find_current(
        &self,
        base: &str,
        target: &str,
        at: DateTime<Utc>,
    ) -> Result<Option<ExchangeRate>, AppError>;
}

/// Price-sync sessions and change logs
#[async_trait]
pub trait PriceSyncAuditRepository: Send + Sync {
    /// Open a session
    async fn create_session(
        &self,
        registrar_id: i32,
        triggered_by: &str,
        started_at: DateTime<Utc>,
    ) -> Result<RegistrarTldPriceDownloadSession, AppError>;

    /// Record the session outcome
    async fn complete_session(
        &self,
        session_id: i64,
        outcome: &SessionOutcome,
        completed_at: DateTime<Utc>,
    ) -> Result<RegistrarTldPriceDownloadSession, AppError>;

    /// Check for a successful session started on `date` (UTC)
    async fn has_successful_session_on(
        &self,
        registrar_id: i32,
        date: NaiveDate,
    ) -> Result<bool, AppError>;

    /// List sessions, newest first, with total count
    async fn list_sessions(
        &self,
        registrar_id: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<RegistrarTldPriceDownloadSession>, i64), AppError>;

    /// Change logs of an offering, newest first
    async fn list_change_logs(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> Result<Vec<RegistrarTldPriceChangeLog>, AppError>;
}

/// Outbound email storage
#[async_trait]
pub trait EmailQueueRepository: Send + Sync {
    /// Insert a pending email due at `now`
    async fn insert(
        &self,
        email: &NewEmail,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> Result<QueuedEmail, AppError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<QueuedEmail>, AppError>;

    /// Emails due at `now` (pending, or with an expired claim), oldest first
    async fn find_due(&self, now: DateTime<Utc>, limit: i64)
        -> Result<Vec<QueuedEmail>, AppError>;

    /// Move a due email to `Sending`, reserved until `claimed_until`
    ///
    /// Returns None when another worker got there first or the email is not due.
    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        claimed_until: DateTime<Utc>,
    ) -> Result<Option<QueuedEmail>, AppError>;

    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> Result<(), AppError>;

    /// Back to `Pending` with a new due time
    async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> Result<(), AppError>;

    async fn mark_failed(&self, id: i64, attempts: i32, error: &str) -> Result<(), AppError>;

    /// Count emails per status
    async fn count_by_status(&self, status: EmailStatus) -> Result<i64, AppError>;
}

/// Pagination parameters
#[derive(Debug, Clone, Default)]
pub struct Pagination {
    pub page: i64,
    pub per_page: i64,
}

impl Pagination {
    pub fn new(page: i64, per_page: i64) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, 500),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.per_page
    }

    pub fn limit(&self) -> i64 {
        self.per_page
    }
}

/// Paginated response wrapper
#[derive(Debug, Clone, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResponse<T> {
    pub fn new(data: Vec<T>, total: i64, pagination: &Pagination) -> Self {
        Self {
            data,
            pagination: PaginationMeta::new(total, pagination.page, pagination.per_page),
        }
    }
}

/// Pagination metadata
#[derive(Debug, Clone, Serialize)]
pub struct PaginationMeta {
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}

impl PaginationMeta {
    pub fn new(total: i64, page: i64, per_page: i64) -> Self {
        let total_pages = if per_page > 0 {
            (total + per_page - 1) / per_page
        } else {
            0
        };

        Self {
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_offset() {
        let p = Pagination::new(3, 25);
        assert_eq!(p.offset(), 50);
        assert_eq!(p.limit(), 25);
    }

    #[test]
    fn test_pagination_clamps() {
        assert_eq!(Pagination::new(-2, 10).page, 1);
        assert_eq!(Pagination::new(1, 0).per_page, 1);
        assert_eq!(Pagination::new(1, 9000).per_page, 500);
    }

    #[test]
    fn test_paginated_response_meta() {
        let page = Pagination::new(2, 10);
        let resp = PaginatedResponse::new(vec![1, 2, 3], 23, &page);
        assert_eq!(resp.pagination.total_pages, 3);
        assert_eq!(resp.pagination.page, 2);
        assert_eq!(resp.data.len(), 3);
    }
}
