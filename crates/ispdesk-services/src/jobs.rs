//! Periodic background jobs
//!
//! Each job is a tokio task ticking on an interval until the shared
//! cancellation token fires. The first tick happens immediately.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::constants::SCHEDULER_TRIGGER;
use crate::price_sync::RegistrarTldPriceSyncService;
use crate::pricing_store::TldPricingService;

/// Run `sync_all` every `interval`
pub fn spawn_price_sync_job(
    service: Arc<RegistrarTldPriceSyncService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Price sync job started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    match service.sync_all(SCHEDULER_TRIGGER, &cancel).await {
                        Ok(sessions) => {
                            let failed = sessions.iter().filter(|s| !s.success).count();
                            if failed > 0 {
                                error!("{} of {} registrar syncs failed", failed, sessions.len());
                            }
                        }
                        Err(e) => error!("Price sync run failed: {}", e),
                    }
                }
            }
        }

        info!("Price sync job stopped");
    })
}

/// Run `archive_closed` every `interval`
pub fn spawn_archive_job(
    service: Arc<TldPricingService>,
    interval: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Archive job started (every {:?})", interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = service.archive_closed().await {
                        error!("Pricing archival failed: {}", e);
                    }
                }
            }
        }

        info!("Archive job stopped");
    })
}
