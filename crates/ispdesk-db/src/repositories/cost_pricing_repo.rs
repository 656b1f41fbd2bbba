//! Registrar-TLD cost pricing repository implementation
//!
//! Effective-dated storage of what registrars charge per offering. Replacing
//! a cost closes the previous row, inserts the new one and writes the change
//! log in a single transaction.

use ispdesk_core::{
    models::{
        NewCostPricing, NewPriceChangeLog, PriceSet, RegistrarTldCostPricing,
        SupersedeCostPricing,
    },
    traits::CostPricingRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};

use super::pricing_insert_error;

const COST_COLUMNS: &str = r#"
    id, registrar_tld_id, effective_from, effective_to,
    registration_cost, renewal_cost, transfer_cost,
    currency, is_active, notes, created_at
"#;

/// PostgreSQL implementation of CostPricingRepository
pub struct PgCostPricingRepository {
    pool: PgPool,
}

impl PgCostPricingRepository {
    /// Create a new cost pricing repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        pricing: &NewCostPricing,
    ) -> AppResult<RegistrarTldCostPricing> {
        let row = sqlx::query_as::<Postgres, CostPricingRow>(&format!(
            r#"
            INSERT INTO registrar_tld_cost_pricing (
                registrar_tld_id, effective_from, effective_to,
                registration_cost, renewal_cost, transfer_cost,
                currency, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COST_COLUMNS}
            "#
        ))
        .bind(pricing.registrar_tld_id)
        .bind(pricing.effective_from)
        .bind(pricing.effective_to)
        .bind(pricing.costs.registration)
        .bind(pricing.costs.renewal)
        .bind(pricing.costs.transfer)
        .bind(&pricing.currency)
        .bind(&pricing.notes)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            error!(
                "Database error inserting cost pricing for registrar_tld {}: {}",
                pricing.registrar_tld_id, e
            );
            pricing_insert_error("cost pricing", e)
        })?;

        Ok(row.into())
    }

    async fn insert_change_log_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        log: &NewPriceChangeLog,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO registrar_tld_price_change_logs (
                registrar_tld_id, download_session_id,
                old_registration_price, new_registration_price,
                old_renewal_price, new_renewal_price,
                old_transfer_price, new_transfer_price,
                old_currency, new_currency,
                change_source, changed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(log.registrar_tld_id)
        .bind(log.download_session_id)
        .bind(log.old_costs.map(|c| c.registration))
        .bind(log.new_costs.registration)
        .bind(log.old_costs.map(|c| c.renewal))
        .bind(log.new_costs.renewal)
        .bind(log.old_costs.map(|c| c.transfer))
        .bind(log.new_costs.transfer)
        .bind(&log.old_currency)
        .bind(&log.new_currency)
        .bind(&log.change_source)
        .bind(log.changed_at)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            error!("Database error writing price change log: {}", e);
            AppError::Database(format!("Failed to write price change log: {}", e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl CostPricingRepository for PgCostPricingRepository {
    #[instrument(skip(self))]
    async fn find_current(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<RegistrarTldCostPricing>> {
        debug!("Finding current cost for registrar_tld {}", registrar_tld_id);

        let row = sqlx::query_as::<Postgres, CostPricingRow>(&format!(
            r#"
            SELECT {COST_COLUMNS}
            FROM registrar_tld_cost_pricing
            WHERE registrar_tld_id = $1
                AND is_active
                AND effective_from <= $2
                AND (effective_to IS NULL OR effective_to >= $2)
            ORDER BY effective_from DESC
            LIMIT 1
            "#
        ))
        .bind(registrar_tld_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error finding current cost for registrar_tld {}: {}",
                registrar_tld_id, e
            );
            AppError::Database(format!("Failed to find current cost: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_future(
        &self,
        registrar_tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        let rows = sqlx::query_as::<Postgres, CostPricingRow>(&format!(
            r#"
            SELECT {COST_COLUMNS}
            FROM registrar_tld_cost_pricing
            WHERE registrar_tld_id = $1
                AND is_active
                AND effective_from > $2
            ORDER BY effective_from ASC
            "#
        ))
        .bind(registrar_tld_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding future costs: {}", e);
            AppError::Database(format!("Failed to find future costs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_overlapping(
        &self,
        registrar_tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        let rows = sqlx::query_as::<Postgres, CostPricingRow>(&format!(
            r#"
            SELECT {COST_COLUMNS}
            FROM registrar_tld_cost_pricing
            WHERE registrar_tld_id = $1
                AND is_active
                AND ($3::timestamptz IS NULL OR effective_from <= $3)
                AND (effective_to IS NULL OR effective_to >= $2)
            ORDER BY effective_from ASC
            "#
        ))
        .bind(registrar_tld_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding overlapping costs: {}", e);
            AppError::Database(format!("Failed to find overlapping costs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_history(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> AppResult<Vec<RegistrarTldCostPricing>> {
        let rows = sqlx::query_as::<Postgres, CostPricingRow>(&format!(
            r#"
            SELECT {COST_COLUMNS}
            FROM registrar_tld_cost_pricing
            WHERE registrar_tld_id = $1
            ORDER BY effective_from DESC
            LIMIT $2
            "#
        ))
        .bind(registrar_tld_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading cost history: {}", e);
            AppError::Database(format!("Failed to load cost history: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, pricing))]
    async fn insert(&self, pricing: &NewCostPricing) -> AppResult<RegistrarTldCostPricing> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        let created = Self::insert_in_tx(&mut tx, pricing).await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn close(&self, id: i64, effective_to: DateTime<Utc>) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE registrar_tld_cost_pricing SET effective_to = $2 WHERE id = $1",
        )
        .bind(id)
        .bind(effective_to)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error closing cost pricing {}: {}", id, e);
            AppError::Database(format!("Failed to close cost pricing: {}", e))
        })?;

        if result.rows_affected() == 0 {
            return Err(AppError::PricingNotFound(format!("cost pricing {}", id)));
        }

        Ok(())
    }

    #[instrument(skip(self, change), fields(registrar_tld_id = change.new.registrar_tld_id))]
    async fn supersede(
        &self,
        change: &SupersedeCostPricing,
    ) -> AppResult<RegistrarTldCostPricing> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        if let Some((previous_id, effective_to)) = change.previous {
            // Only a row still running past the close point may be shortened
            let result = sqlx::query(
                r#"
                UPDATE registrar_tld_cost_pricing SET effective_to = $2
                WHERE id = $1 AND effective_from <= $2
                  AND (effective_to IS NULL OR effective_to > $2)
                "#,
            )
            .bind(previous_id)
            .bind(effective_to)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error closing cost pricing {}: {}", previous_id, e);
                AppError::Database(format!("Failed to close cost pricing: {}", e))
            })?;

            if result.rows_affected() == 0 {
                warn!(
                    "Cost pricing {} was closed or replaced before this write",
                    previous_id
                );
                return Err(AppError::OverlappingPricing {
                    key: format!("registrar_tld:{}", change.new.registrar_tld_id),
                    existing_id: previous_id,
                });
            }
        }

        let created = Self::insert_in_tx(&mut tx, &change.new).await?;
        Self::insert_change_log_in_tx(&mut tx, &change.change_log).await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Cost pricing {} now effective from {} for registrar_tld {}",
            created.id, created.effective_from, created.registrar_tld_id
        );

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(&format!(
            r#"
            WITH moved AS (
                DELETE FROM registrar_tld_cost_pricing
                WHERE effective_to IS NOT NULL AND effective_to < $1
                RETURNING {COST_COLUMNS}
            )
            INSERT INTO registrar_tld_cost_pricing_archive ({COST_COLUMNS})
            SELECT {COST_COLUMNS} FROM moved
            "#
        ))
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error archiving cost pricing: {}", e);
            AppError::Database(format!("Failed to archive cost pricing: {}", e))
        })?;

        Ok(result.rows_affected())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct CostPricingRow {
    id: i64,
    registrar_tld_id: i32,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
    registration_cost: Decimal,
    renewal_cost: Decimal,
    transfer_cost: Decimal,
    currency: String,
    is_active: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CostPricingRow> for RegistrarTldCostPricing {
    fn from(row: CostPricingRow) -> Self {
        Self {
            id: row.id,
            registrar_tld_id: row.registrar_tld_id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            costs: PriceSet::new(row.registration_cost, row.renewal_cost, row.transfer_cost),
            currency: row.currency.trim().to_string(),
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_row_conversion_trims_currency() {
        let row = CostPricingRow {
            id: 7,
            registrar_tld_id: 3,
            effective_from: Utc::now(),
            effective_to: None,
            registration_cost: dec!(8.50),
            renewal_cost: dec!(9.25),
            transfer_cost: dec!(8.50),
            currency: "USD ".to_string(),
            is_active: true,
            notes: None,
            created_at: Utc::now(),
        };

        let pricing: RegistrarTldCostPricing = row.into();
        assert_eq!(pricing.currency, "USD");
        assert_eq!(pricing.costs.renewal, dec!(9.25));
    }
}
