//! TLD sales pricing repository implementation

use ispdesk_core::{
    models::{NewSalesPricing, PriceSet, SupersedeSalesPricing, TldSalesPricing},
    traits::SalesPricingRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};

use super::pricing_insert_error;

const SALES_COLUMNS: &str = r#"
    id, tld_id, effective_from, effective_to,
    registration_price, renewal_price, transfer_price,
    currency, is_active, notes, created_at
"#;

/// PostgreSQL implementation of SalesPricingRepository
pub struct PgSalesPricingRepository {
    pool: PgPool,
}

impl PgSalesPricingRepository {
    /// Create a new sales pricing repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn insert_in_tx(
        tx: &mut Transaction<'_, Postgres>,
        pricing: &NewSalesPricing,
    ) -> AppResult<TldSalesPricing> {
        let row = sqlx::query_as::<Postgres, SalesPricingRow>(&format!(
            r#"
            INSERT INTO tld_sales_pricing (
                tld_id, effective_from, effective_to,
                registration_price, renewal_price, transfer_price,
                currency, notes
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {SALES_COLUMNS}
            "#
        ))
        .bind(pricing.tld_id)
        .bind(pricing.effective_from)
        .bind(pricing.effective_to)
        .bind(pricing.prices.registration)
        .bind(pricing.prices.renewal)
        .bind(pricing.prices.transfer)
        .bind(&pricing.currency)
        .bind(&pricing.notes)
        .fetch_one(&mut **tx)
        .await
        .map_err(|e| {
            error!(
                "Database error inserting sales pricing for tld {}: {}",
                pricing.tld_id, e
            );
            pricing_insert_error("sales pricing", e)
        })?;

        Ok(row.into())
    }
}

#[async_trait]
impl SalesPricingRepository for PgSalesPricingRepository {
    #[instrument(skip(self))]
    async fn find_current(
        &self,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Option<TldSalesPricing>> {
        debug!("Finding current sales price for tld {}", tld_id);

        let row = sqlx::query_as::<Postgres, SalesPricingRow>(&format!(
            r#"
            SELECT {SALES_COLUMNS}
            FROM tld_sales_pricing
            WHERE tld_id = $1
                AND is_active
                AND effective_from <= $2
                AND (effective_to IS NULL OR effective_to >= $2)
            ORDER BY effective_from DESC
            LIMIT 1
            "#
        ))
        .bind(tld_id)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding current sales price for tld {}: {}", tld_id, e);
            AppError::Database(format!("Failed to find current sales price: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_future(&self, tld_id: i32, at: DateTime<Utc>) -> AppResult<Vec<TldSalesPricing>> {
        let rows = sqlx::query_as::<Postgres, SalesPricingRow>(&format!(
            r#"
            SELECT {SALES_COLUMNS}
            FROM tld_sales_pricing
            WHERE tld_id = $1
                AND is_active
                AND effective_from > $2
            ORDER BY effective_from ASC
            "#
        ))
        .bind(tld_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding future sales prices: {}", e);
            AppError::Database(format!("Failed to find future sales prices: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_overlapping(
        &self,
        tld_id: i32,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<TldSalesPricing>> {
        let rows = sqlx::query_as::<Postgres, SalesPricingRow>(&format!(
            r#"
            SELECT {SALES_COLUMNS}
            FROM tld_sales_pricing
            WHERE tld_id = $1
                AND is_active
                AND ($3::timestamptz IS NULL OR effective_from <= $3)
                AND (effective_to IS NULL OR effective_to >= $2)
            ORDER BY effective_from ASC
            "#
        ))
        .bind(tld_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding overlapping sales prices: {}", e);
            AppError::Database(format!("Failed to find overlapping sales prices: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_history(&self, tld_id: i32, limit: i64) -> AppResult<Vec<TldSalesPricing>> {
        let rows = sqlx::query_as::<Postgres, SalesPricingRow>(&format!(
            r#"
            SELECT {SALES_COLUMNS}
            FROM tld_sales_pricing
            WHERE tld_id = $1
            ORDER BY effective_from DESC
            LIMIT $2
            "#
        ))
        .bind(tld_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error loading sales price history: {}", e);
            AppError::Database(format!("Failed to load sales price history: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, pricing))]
    async fn insert(&self, pricing: &NewSalesPricing) -> AppResult<TldSalesPricing> {
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

    #[instrument(skip(self, change), fields(tld_id = change.new.tld_id))]
    async fn supersede(&self, change: &SupersedeSalesPricing) -> AppResult<TldSalesPricing> {
        let mut tx = self.pool.begin().await.map_err(|e| {
            error!("Failed to start transaction: {}", e);
            AppError::Transaction(format!("Failed to start transaction: {}", e))
        })?;

        if let Some((previous_id, effective_to)) = change.previous {
            let result = sqlx::query(
                r#"
                UPDATE tld_sales_pricing SET effective_to = $2
                WHERE id = $1 AND effective_from <= $2
                  AND (effective_to IS NULL OR effective_to > $2)
                "#,
            )
            .bind(previous_id)
            .bind(effective_to)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                error!("Database error closing sales pricing {}: {}", previous_id, e);
                AppError::Database(format!("Failed to close sales pricing: {}", e))
            })?;

            if result.rows_affected() == 0 {
                warn!(
                    "Sales pricing {} was closed or replaced before this write",
                    previous_id
                );
                return Err(AppError::OverlappingPricing {
                    key: format!("tld:{}", change.new.tld_id),
                    existing_id: previous_id,
                });
            }
        }

        let created = Self::insert_in_tx(&mut tx, &change.new).await?;

        tx.commit().await.map_err(|e| {
            error!("Failed to commit transaction: {}", e);
            AppError::Transaction(format!("Failed to commit transaction: {}", e))
        })?;

        info!(
            "Sales pricing {} now effective from {} for tld {}",
            created.id, created.effective_from, created.tld_id
        );

        Ok(created)
    }

    #[instrument(skip(self))]
    async fn archive_closed_before(&self, cutoff: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query(&format!(
            r#"
            WITH moved AS (
                DELETE FROM tld_sales_pricing
                WHERE effective_to IS NOT NULL AND effective_to < $1
                RETURNING {SALES_COLUMNS}
            )
            INSERT INTO tld_sales_pricing_archive ({SALES_COLUMNS})
            SELECT {SALES_COLUMNS} FROM moved
            "#
        ))
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error archiving sales pricing: {}", e);
            AppError::Database(format!("Failed to archive sales pricing: {}", e))
        })?;

        Ok(result.rows_affected())
    }
}

/// Helper struct for mapping database rows
#[derive(Debug, sqlx::FromRow)]
struct SalesPricingRow {
    id: i64,
    tld_id: i32,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
    registration_price: Decimal,
    renewal_price: Decimal,
    transfer_price: Decimal,
    currency: String,
    is_active: bool,
    notes: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<SalesPricingRow> for TldSalesPricing {
    fn from(row: SalesPricingRow) -> Self {
        Self {
            id: row.id,
            tld_id: row.tld_id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            prices: PriceSet::new(
                row.registration_price,
                row.renewal_price,
                row.transfer_price,
            ),
            currency: row.currency.trim().to_string(),
            is_active: row.is_active,
            notes: row.notes,
            created_at: row.created_at,
        }
    }
}
