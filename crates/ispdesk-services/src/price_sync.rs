//! Registrar TLD price synchronization
//!
//! Downloads the price list of each registrar, diffs it against the current
//! cost rows of the registrar's TLD offerings and supersedes the rows whose
//! prices changed. Every run is recorded as a download session; every change
//! as a change log row pointing at the session.
//!
//! A failing run never propagates its error: the session is completed with
//! `success = false` and the error message, and the caller gets the session.

use chrono::{DateTime, Utc};
use ispdesk_core::{
    config::PricingConfig,
    models::{
        close_before, normalize_currency, normalize_extension, sync::CHANGE_SOURCE_SYNC,
        tld::is_valid_currency, NewCostPricing, NewPriceChangeLog, PriceSet, Registrar,
        RegistrarTld, RegistrarTldPriceDownloadSession, SessionOutcome, SupersedeCostPricing,
    },
    AppError, AppResult,
};
use ispdesk_registrar::{RegistrarClientFactory, TldPriceInfo};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::context::ServiceContext;

/// Registrar price download and diff
pub struct RegistrarTldPriceSyncService {
    ctx: Arc<ServiceContext>,
    factory: Arc<dyn RegistrarClientFactory>,
    base_currency: String,
}

impl RegistrarTldPriceSyncService {
    /// Create a new price sync service
    pub fn new(
        ctx: Arc<ServiceContext>,
        factory: Arc<dyn RegistrarClientFactory>,
        config: &PricingConfig,
    ) -> Self {
        Self {
            ctx,
            factory,
            base_currency: normalize_currency(&config.base_currency),
        }
    }

    /// Sync every active registrar not yet synced successfully today
    pub async fn sync_all(
        &self,
        triggered_by: &str,
        cancel: &CancellationToken,
    ) -> AppResult<Vec<RegistrarTldPriceDownloadSession>> {
        self.sync_all_at(triggered_by, cancel, Utc::now()).await
    }

    /// Sync every active registrar as of `now`
    ///
    /// Returns one session per attempted registrar. Stops between registrars
    /// once `cancel` fires.
    #[instrument(skip(self, cancel))]
    pub async fn sync_all_at(
        &self,
        triggered_by: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<RegistrarTldPriceDownloadSession>> {
        let registrars = self.ctx.registrars.list_active().await?;
        let today = now.date_naive();
        let mut sessions = Vec::new();

        info!(
            "Starting price sync for {} active registrars",
            registrars.len()
        );

        for registrar in &registrars {
            if cancel.is_cancelled() {
                info!(
                    "Price sync cancelled after {} sessions",
                    sessions.len()
                );
                break;
            }

            if self
                .ctx
                .sync_audit
                .has_successful_session_on(registrar.id, today)
                .await?
            {
                debug!("Registrar {} already synced on {}", registrar.code, today);
                continue;
            }

            match self.run_session(registrar, triggered_by, cancel, now).await {
                Ok(session) => sessions.push(session),
                Err(e) => error!(
                    "Could not open sync session for registrar {}: {}",
                    registrar.code, e
                ),
            }
        }

        info!("Price sync finished: {} sessions", sessions.len());
        Ok(sessions)
    }

    /// Sync a single registrar
    pub async fn sync_registrar(
        &self,
        registrar_id: i32,
        triggered_by: &str,
        force: bool,
        cancel: &CancellationToken,
    ) -> AppResult<Option<RegistrarTldPriceDownloadSession>> {
        self.sync_registrar_at(registrar_id, triggered_by, force, cancel, Utc::now())
            .await
    }

    /// Sync a single registrar as of `now`
    ///
    /// Returns None when the registrar was already synced successfully on
    /// `now`'s UTC date and `force` is false.
    ///
    /// # Errors
    ///
    /// - `AppError::RegistrarNotFound` if the registrar does not exist
    /// - `AppError::InvalidInput` if the registrar is inactive
    #[instrument(skip(self, cancel))]
    pub async fn sync_registrar_at(
        &self,
        registrar_id: i32,
        triggered_by: &str,
        force: bool,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> AppResult<Option<RegistrarTldPriceDownloadSession>> {
        let registrar = self
            .ctx
            .registrars
            .find_by_id(registrar_id)
            .await?
            .ok_or_else(|| AppError::RegistrarNotFound(format!("id {}", registrar_id)))?;

        if !registrar.is_active {
            return Err(AppError::InvalidInput(format!(
                "Registrar {} is not active",
                registrar.code
            )));
        }

        if !force
            && self
                .ctx
                .sync_audit
                .has_successful_session_on(registrar.id, now.date_naive())
                .await?
        {
            info!(
                "Registrar {} already synced today, skipping",
                registrar.code
            );
            return Ok(None);
        }

        self.run_session(&registrar, triggered_by, cancel, now)
            .await
            .map(Some)
    }

    /// Open a session, sync, and complete the session with the outcome
    async fn run_session(
        &self,
        registrar: &Registrar,
        triggered_by: &str,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
    ) -> AppResult<RegistrarTldPriceDownloadSession> {
        let session = self
            .ctx
            .sync_audit
            .create_session(registrar.id, triggered_by, now)
            .await?;

        let mut outcome = SessionOutcome::default();
        match self
            .sync_prices(registrar, session.id, cancel, now, &mut outcome)
            .await
        {
            Ok(()) => {
                outcome.success = true;
                info!(
                    "Registrar {} synced: {} TLDs processed, {} price changes",
                    registrar.code, outcome.tlds_processed, outcome.price_changes_detected
                );
            }
            Err(e) => {
                error!(
                    "Price sync for registrar {} failed (session {}): {}",
                    registrar.code, session.id, e
                );
                outcome.success = false;
                outcome.error_message = Some(e.to_string());
            }
        }

        match self
            .ctx
            .sync_audit
            .complete_session(session.id, &outcome, now)
            .await
        {
            Ok(completed) => Ok(completed),
            Err(e) => {
                error!("Failed to complete session {}: {}", session.id, e);
                Ok(RegistrarTldPriceDownloadSession {
                    completed_at: Some(now),
                    success: outcome.success,
                    tlds_processed: outcome.tlds_processed,
                    price_changes_detected: outcome.price_changes_detected,
                    error_message: outcome.error_message,
                    ..session
                })
            }
        }
    }

    async fn sync_prices(
        &self,
        registrar: &Registrar,
        session_id: i64,
        cancel: &CancellationToken,
        now: DateTime<Utc>,
        outcome: &mut SessionOutcome,
    ) -> AppResult<()> {
        let client = self.factory.client_for(registrar)?;
        if !client.code().eq_ignore_ascii_case(registrar.code.trim()) {
            return Err(AppError::RegistrarCodeMismatch {
                expected: registrar.code.clone(),
                actual: client.code().to_string(),
            });
        }

        let fetched = client.get_supported_tlds().await?;
        debug!(
            "Registrar {} returned {} TLDs",
            registrar.code,
            fetched.len()
        );

        let offerings: HashMap<String, RegistrarTld> = self
            .ctx
            .tlds
            .list_offerings_by_registrar(registrar.id)
            .await?
            .into_iter()
            .map(|o| (normalize_extension(&o.extension), o))
            .collect();

        for info in &fetched {
            if cancel.is_cancelled() {
                warn!(
                    "Sync of registrar {} cancelled after {} TLDs",
                    registrar.code, outcome.tlds_processed
                );
                return Err(AppError::SyncCancelled);
            }

            let extension = normalize_extension(&info.extension);
            let offering = match offerings.get(&extension) {
                Some(o) => o,
                None => {
                    debug!("No local offering for .{}", extension);
                    continue;
                }
            };

            if !info.has_price_data() {
                debug!("No price data for .{}", extension);
                continue;
            }

            outcome.tlds_processed += 1;
            if self.apply_price(offering, info, session_id, now).await? {
                outcome.price_changes_detected += 1;
            }
        }

        Ok(())
    }

    /// Supersede the offering's cost row if the fetched price differs
    ///
    /// Returns whether a new row was written.
    async fn apply_price(
        &self,
        offering: &RegistrarTld,
        info: &TldPriceInfo,
        session_id: i64,
        now: DateTime<Utc>,
    ) -> AppResult<bool> {
        let current = self
            .ctx
            .cost_pricing
            .find_current(offering.id, now)
            .await?;

        let fallback = current.as_ref().map(|c| c.costs).unwrap_or_default();
        let fetched = PriceSet::new(
            info.registration_price.unwrap_or(fallback.registration),
            info.renewal_price.unwrap_or(fallback.renewal),
            info.transfer_price.unwrap_or(fallback.transfer),
        );
        let currency = info
            .currency
            .as_deref()
            .map(normalize_currency)
            .or_else(|| current.as_ref().map(|c| normalize_currency(&c.currency)))
            .unwrap_or_else(|| self.base_currency.clone());

        // Compare at the stored precision, or every sync would see a change
        let costs = match fetched.to_stored_scale() {
            Some(costs) if costs.is_non_negative() && is_valid_currency(&currency) => costs,
            _ => {
                warn!(
                    "Ignoring invalid price data for .{}: {:?} {}",
                    offering.extension, fetched, currency
                );
                return Ok(false);
            }
        };

        if let Some(cur) = &current {
            if !cur.differs_from(&costs, &currency) {
                return Ok(false);
            }
        }

        let previous = match &current {
            Some(cur) => {
                let closed_at = close_before(now);
                if closed_at < cur.effective_from {
                    warn!(
                        "Cost row {} for .{} started less than a second ago, skipping",
                        cur.id, offering.extension
                    );
                    return Ok(false);
                }
                Some((cur.id, closed_at))
            }
            None => None,
        };

        let effective_to = self
            .ctx
            .cost_pricing
            .find_next_future(offering.id, now)
            .await?
            .map(|next| close_before(next.effective_from));
        if effective_to.map_or(false, |to| to < now) {
            warn!(
                "Next cost row for .{} starts within a second, skipping",
                offering.extension
            );
            return Ok(false);
        }

        let change = SupersedeCostPricing {
            previous,
            new: NewCostPricing {
                registrar_tld_id: offering.id,
                effective_from: now,
                effective_to,
                costs,
                currency: currency.clone(),
                notes: Some(format!("Registrar price sync session {}", session_id)),
            },
            change_log: NewPriceChangeLog {
                registrar_tld_id: offering.id,
                download_session_id: Some(session_id),
                old_costs: current.as_ref().map(|c| c.costs),
                new_costs: costs,
                old_currency: current.as_ref().map(|c| c.currency.clone()),
                new_currency: currency,
                change_source: CHANGE_SOURCE_SYNC.to_string(),
                changed_at: now,
            },
        };

        let created = self.ctx.cost_pricing.supersede(&change).await?;
        info!(
            "Cost change for .{} (offering {}): row {} from {}",
            offering.extension, offering.id, created.id, created.effective_from
        );
        Ok(true)
    }
}
