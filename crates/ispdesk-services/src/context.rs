//! Shared repository handles for the services

use ispdesk_core::traits::{
    CostPricingRepository, DiscountRepository, EmailQueueRepository, ExchangeRateRepository,
    PreferenceRepository, PriceSyncAuditRepository, RegistrarRepository, SalesPricingRepository,
    TldRepository,
};
use ispdesk_db::{
    PgCostPricingRepository, PgDiscountRepository, PgEmailQueueRepository,
    PgExchangeRateRepository, PgPreferenceRepository, PgPriceSyncAuditRepository,
    PgRegistrarRepository, PgSalesPricingRepository, PgTldRepository,
};
use sqlx::PgPool;
use std::sync::Arc;

/// Repositories shared by every service
pub struct ServiceContext {
    pub registrars: Arc<dyn RegistrarRepository>,
    pub tlds: Arc<dyn TldRepository>,
    pub cost_pricing: Arc<dyn CostPricingRepository>,
    pub sales_pricing: Arc<dyn SalesPricingRepository>,
    pub discounts: Arc<dyn DiscountRepository>,
    pub preferences: Arc<dyn PreferenceRepository>,
    pub exchange_rates: Arc<dyn ExchangeRateRepository>,
    pub sync_audit: Arc<dyn PriceSyncAuditRepository>,
    pub emails: Arc<dyn EmailQueueRepository>,
}

impl ServiceContext {
    /// Build a context backed by PostgreSQL
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            registrars: Arc::new(PgRegistrarRepository::new(pool.clone())),
            tlds: Arc::new(PgTldRepository::new(pool.clone())),
            cost_pricing: Arc::new(PgCostPricingRepository::new(pool.clone())),
            sales_pricing: Arc::new(PgSalesPricingRepository::new(pool.clone())),
            discounts: Arc::new(PgDiscountRepository::new(pool.clone())),
            preferences: Arc::new(PgPreferenceRepository::new(pool.clone())),
            exchange_rates: Arc::new(PgExchangeRateRepository::new(pool.clone())),
            sync_audit: Arc::new(PgPriceSyncAuditRepository::new(pool.clone())),
            emails: Arc::new(PgEmailQueueRepository::new(pool)),
        }
    }
}
