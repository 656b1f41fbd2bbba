//! Reseller discount, selection preference and exchange rate repositories

use ispdesk_core::{
    models::{
        ExchangeRate, NewDiscount, PricingOperation, RegistrarSelectionPreference,
        ResellerTldDiscount,
    },
    traits::{DiscountRepository, ExchangeRateRepository, PreferenceRepository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use tracing::{debug, error, instrument, warn};

const DISCOUNT_COLUMNS: &str = r#"
    id, reseller_company_id, tld_id, effective_from, effective_to,
    discount_percentage, discount_amount, currency, operation,
    is_active, created_at
"#;

/// PostgreSQL implementation of DiscountRepository
pub struct PgDiscountRepository {
    pool: PgPool,
}

impl PgDiscountRepository {
    /// Create a new discount repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DiscountRepository for PgDiscountRepository {
    #[instrument(skip(self))]
    async fn find_active(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        at: DateTime<Utc>,
    ) -> AppResult<Vec<ResellerTldDiscount>> {
        debug!(
            "Finding discounts for company {} on tld {}",
            reseller_company_id, tld_id
        );

        let rows = sqlx::query_as::<Postgres, DiscountRow>(&format!(
            r#"
            SELECT {DISCOUNT_COLUMNS}
            FROM reseller_tld_discounts
            WHERE reseller_company_id = $1
                AND tld_id = $2
                AND is_active
                AND effective_from <= $3
                AND (effective_to IS NULL OR effective_to >= $3)
            ORDER BY effective_from DESC
            "#
        ))
        .bind(reseller_company_id)
        .bind(tld_id)
        .bind(at)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding discounts: {}", e);
            AppError::Database(format!("Failed to find discounts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_overlapping(
        &self,
        reseller_company_id: i32,
        tld_id: i32,
        operation: Option<PricingOperation>,
        from: DateTime<Utc>,
        to: Option<DateTime<Utc>>,
    ) -> AppResult<Vec<ResellerTldDiscount>> {
        let rows = sqlx::query_as::<Postgres, DiscountRow>(&format!(
            r#"
            SELECT {DISCOUNT_COLUMNS}
            FROM reseller_tld_discounts
            WHERE reseller_company_id = $1
                AND tld_id = $2
                AND operation IS NOT DISTINCT FROM $3
                AND is_active
                AND ($5::timestamptz IS NULL OR effective_from <= $5)
                AND (effective_to IS NULL OR effective_to >= $4)
            ORDER BY effective_from ASC
            "#
        ))
        .bind(reseller_company_id)
        .bind(tld_id)
        .bind(operation.map(|op| op.as_str()))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding overlapping discounts: {}", e);
            AppError::Database(format!("Failed to find overlapping discounts: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self, discount))]
    async fn insert(&self, discount: &NewDiscount) -> AppResult<ResellerTldDiscount> {
        let row = sqlx::query_as::<Postgres, DiscountRow>(&format!(
            r#"
            INSERT INTO reseller_tld_discounts (
                reseller_company_id, tld_id, effective_from, effective_to,
                discount_percentage, discount_amount, currency, operation
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {DISCOUNT_COLUMNS}
            "#
        ))
        .bind(discount.reseller_company_id)
        .bind(discount.tld_id)
        .bind(discount.effective_from)
        .bind(discount.effective_to)
        .bind(discount.discount_percentage)
        .bind(discount.discount_amount)
        .bind(&discount.currency)
        .bind(discount.operation.map(|op| op.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error creating discount: {}", e);
            AppError::Database(format!("Failed to create discount: {}", e))
        })?;

        Ok(row.into())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct DiscountRow {
    id: i64,
    reseller_company_id: i32,
    tld_id: i32,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
    discount_percentage: Option<Decimal>,
    discount_amount: Option<Decimal>,
    currency: Option<String>,
    operation: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<DiscountRow> for ResellerTldDiscount {
    fn from(row: DiscountRow) -> Self {
        let operation = row.operation.as_deref().and_then(|op| {
            let parsed = PricingOperation::from_str(op);
            if parsed.is_none() {
                warn!("Discount {} has unknown operation '{}'", row.id, op);
            }
            parsed
        });

        Self {
            id: row.id,
            reseller_company_id: row.reseller_company_id,
            tld_id: row.tld_id,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
            discount_percentage: row.discount_percentage,
            discount_amount: row.discount_amount,
            currency: row.currency.map(|c| c.trim().to_string()),
            operation,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

/// PostgreSQL implementation of PreferenceRepository
pub struct PgPreferenceRepository {
    pool: PgPool,
}

impl PgPreferenceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceRepository for PgPreferenceRepository {
    #[instrument(skip(self))]
    async fn list_active(&self) -> AppResult<Vec<RegistrarSelectionPreference>> {
        let rows = sqlx::query_as::<Postgres, (i32, i32, i32, bool)>(
            r#"
            SELECT id, registrar_id, priority, is_active
            FROM registrar_selection_preferences
            WHERE is_active
            ORDER BY priority DESC, registrar_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing selection preferences: {}", e);
            AppError::Database(format!("Failed to list selection preferences: {}", e))
        })?;

        Ok(rows
            .into_iter()
            .map(
                |(id, registrar_id, priority, is_active)| RegistrarSelectionPreference {
                    id,
                    registrar_id,
                    priority,
                    is_active,
                },
            )
            .collect())
    }
}

/// PostgreSQL implementation of ExchangeRateRepository
pub struct PgExchangeRateRepository {
    pool: PgPool,
}

impl PgExchangeRateRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ExchangeRateRepository for PgExchangeRateRepository {
    #[instrument(skip(self))]
    async fn find_current(
        &self,
        base: &str,
        target: &str,
        at: DateTime<Utc>,
    ) -> AppResult<Option<ExchangeRate>> {
        let row = sqlx::query_as::<Postgres, ExchangeRateRow>(
            r#"
            SELECT id, base_currency, target_currency, rate, effective_from, effective_to
            FROM exchange_rates
            WHERE base_currency = $1
                AND target_currency = $2
                AND effective_from <= $3
                AND (effective_to IS NULL OR effective_to >= $3)
            ORDER BY effective_from DESC
            LIMIT 1
            "#,
        )
        .bind(base)
        .bind(target)
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding rate {}->{}: {}", base, target, e);
            AppError::Database(format!("Failed to find exchange rate: {}", e))
        })?;

        Ok(row.map(Into::into))
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ExchangeRateRow {
    id: i64,
    base_currency: String,
    target_currency: String,
    rate: Decimal,
    effective_from: DateTime<Utc>,
    effective_to: Option<DateTime<Utc>>,
}

impl From<ExchangeRateRow> for ExchangeRate {
    fn from(row: ExchangeRateRow) -> Self {
        Self {
            id: row.id,
            base_currency: row.base_currency.trim().to_string(),
            target_currency: row.target_currency.trim().to_string(),
            rate: row.rate,
            effective_from: row.effective_from,
            effective_to: row.effective_to,
        }
    }
}
