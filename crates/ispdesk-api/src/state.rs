//! Shared application state handed to every handler

use ispdesk_core::AppConfig;
use ispdesk_registrar::RegistrarClientFactory;
use ispdesk_services::{
    EmailQueueService, MarginAnalyzer, PricingCalculator, RegistrarSelector,
    RegistrarTldPriceSyncService, ServiceContext, TldPricingService,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Services used by the HTTP handlers
///
/// Cloning is cheap; every service sits behind an Arc.
#[derive(Clone)]
pub struct AppState {
    pub ctx: Arc<ServiceContext>,
    pub pricing: Arc<TldPricingService>,
    pub calculator: Arc<PricingCalculator>,
    pub selector: Arc<RegistrarSelector>,
    pub margins: Arc<MarginAnalyzer>,
    pub price_sync: Arc<RegistrarTldPriceSyncService>,
    pub emails: Arc<EmailQueueService>,
    /// Fired on shutdown; long-running requests stop early
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Build every service on top of a shared repository context
    pub fn new(
        ctx: Arc<ServiceContext>,
        config: &AppConfig,
        factory: Arc<dyn RegistrarClientFactory>,
        emails: Arc<EmailQueueService>,
        shutdown: CancellationToken,
    ) -> Self {
        let pricing_config = config.pricing.clone();

        Self {
            pricing: Arc::new(TldPricingService::new(
                Arc::clone(&ctx),
                pricing_config.clone(),
            )),
            calculator: Arc::new(PricingCalculator::new(
                Arc::clone(&ctx),
                pricing_config.clone(),
            )),
            selector: Arc::new(RegistrarSelector::new(Arc::clone(&ctx), &pricing_config)),
            margins: Arc::new(MarginAnalyzer::new(Arc::clone(&ctx), pricing_config.clone())),
            price_sync: Arc::new(RegistrarTldPriceSyncService::new(
                Arc::clone(&ctx),
                factory,
                &pricing_config,
            )),
            emails,
            shutdown,
            ctx,
        }
    }
}
