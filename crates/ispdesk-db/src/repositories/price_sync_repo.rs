//! Price-sync audit repository implementation
//!
//! Provides PostgreSQL-backed storage for download sessions and price change logs.

use ispdesk_core::{
    models::{RegistrarTldPriceChangeLog, RegistrarTldPriceDownloadSession, SessionOutcome},
    traits::PriceSyncAuditRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres};
use tracing::{debug, error, instrument};

const SESSION_COLUMNS: &str = r#"
    id, registrar_id, started_at, completed_at, success,
    tlds_processed, price_changes_detected, error_message, triggered_by
"#;

/// PostgreSQL implementation of PriceSyncAuditRepository
pub struct PgPriceSyncAuditRepository {
    pool: PgPool,
}

impl PgPriceSyncAuditRepository {
    /// Create a new price-sync audit repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceSyncAuditRepository for PgPriceSyncAuditRepository {
    #[instrument(skip(self))]
    async fn create_session(
        &self,
        registrar_id: i32,
        triggered_by: &str,
        started_at: DateTime<Utc>,
    ) -> AppResult<RegistrarTldPriceDownloadSession> {
        let row = sqlx::query_as::<Postgres, SessionRow>(&format!(
            r#"
            INSERT INTO registrar_tld_price_download_sessions (
                registrar_id, started_at, triggered_by
            )
            VALUES ($1, $2, $3)
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(registrar_id)
        .bind(started_at)
        .bind(triggered_by)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error creating download session for registrar {}: {}",
                registrar_id, e
            );
            AppError::Database(format!("Failed to create download session: {}", e))
        })?;

        Ok(row.into())
    }

    #[instrument(skip(self, outcome))]
    async fn complete_session(
        &self,
        session_id: i64,
        outcome: &SessionOutcome,
        completed_at: DateTime<Utc>,
    ) -> AppResult<RegistrarTldPriceDownloadSession> {
        let row = sqlx::query_as::<Postgres, SessionRow>(&format!(
            r#"
            UPDATE registrar_tld_price_download_sessions
            SET completed_at = $2,
                success = $3,
                tlds_processed = $4,
                price_changes_detected = $5,
                error_message = $6
            WHERE id = $1
            RETURNING {SESSION_COLUMNS}
            "#
        ))
        .bind(session_id)
        .bind(completed_at)
        .bind(outcome.success)
        .bind(outcome.tlds_processed)
        .bind(outcome.price_changes_detected)
        .bind(&outcome.error_message)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error completing session {}: {}", session_id, e);
            AppError::Database(format!("Failed to complete download session: {}", e))
        })?;

        row.map(Into::into)
            .ok_or_else(|| AppError::NotFound(format!("download session {}", session_id)))
    }

    #[instrument(skip(self))]
    async fn has_successful_session_on(
        &self,
        registrar_id: i32,
        date: NaiveDate,
    ) -> AppResult<bool> {
        let day_start = date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc()).ok_or_else(|| {
            AppError::InvalidInput(format!("Invalid sync date: {}", date))
        })?;
        let day_end = day_start + Duration::days(1);

        let (exists,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM registrar_tld_price_download_sessions
                WHERE registrar_id = $1
                    AND success
                    AND started_at >= $2
                    AND started_at < $3
            )
            "#,
        )
        .bind(registrar_id)
        .bind(day_start)
        .bind(day_end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error checking sync sessions: {}", e);
            AppError::Database(format!("Failed to check sync sessions: {}", e))
        })?;

        debug!(
            "Registrar {} successful session on {}: {}",
            registrar_id, date, exists
        );
        Ok(exists)
    }

    #[instrument(skip(self))]
    async fn list_sessions(
        &self,
        registrar_id: Option<i32>,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<RegistrarTldPriceDownloadSession>, i64)> {
        let rows = sqlx::query_as::<Postgres, SessionRow>(&format!(
            r#"
            SELECT {SESSION_COLUMNS}
            FROM registrar_tld_price_download_sessions
            WHERE ($1::int IS NULL OR registrar_id = $1)
            ORDER BY started_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#
        ))
        .bind(registrar_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing download sessions: {}", e);
            AppError::Database(format!("Failed to list download sessions: {}", e))
        })?;

        let total: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*) FROM registrar_tld_price_download_sessions
            WHERE ($1::int IS NULL OR registrar_id = $1)
            "#,
        )
        .bind(registrar_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error counting download sessions: {}", e);
            AppError::Database(format!("Failed to count download sessions: {}", e))
        })?;

        Ok((rows.into_iter().map(Into::into).collect(), total.0))
    }

    #[instrument(skip(self))]
    async fn list_change_logs(
        &self,
        registrar_tld_id: i32,
        limit: i64,
    ) -> AppResult<Vec<RegistrarTldPriceChangeLog>> {
        let rows = sqlx::query_as::<Postgres, ChangeLogRow>(
            r#"
            SELECT
                id, registrar_tld_id, download_session_id,
                old_registration_price, new_registration_price,
                old_renewal_price, new_renewal_price,
                old_transfer_price, new_transfer_price,
                old_currency, new_currency,
                change_source, changed_at
            FROM registrar_tld_price_change_logs
            WHERE registrar_tld_id = $1
            ORDER BY changed_at DESC, id DESC
            LIMIT $2
            "#,
        )
        .bind(registrar_tld_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing change logs: {}", e);
            AppError::Database(format!("Failed to list price change logs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SessionRow {
    id: i64,
    registrar_id: i32,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    success: bool,
    tlds_processed: i32,
    price_changes_detected: i32,
    error_message: Option<String>,
    triggered_by: String,
}

impl From<SessionRow> for RegistrarTldPriceDownloadSession {
    fn from(row: SessionRow) -> Self {
        Self {
            id: row.id,
            registrar_id: row.registrar_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            success: row.success,
            tlds_processed: row.tlds_processed,
            price_changes_detected: row.price_changes_detected,
            error_message: row.error_message,
            triggered_by: row.triggered_by,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ChangeLogRow {
    id: i64,
    registrar_tld_id: i32,
    download_session_id: Option<i64>,
    old_registration_price: Option<Decimal>,
    new_registration_price: Decimal,
    old_renewal_price: Option<Decimal>,
    new_renewal_price: Decimal,
    old_transfer_price: Option<Decimal>,
    new_transfer_price: Decimal,
    old_currency: Option<String>,
    new_currency: String,
    change_source: String,
    changed_at: DateTime<Utc>,
}

impl From<ChangeLogRow> for RegistrarTldPriceChangeLog {
    fn from(row: ChangeLogRow) -> Self {
        Self {
            id: row.id,
            registrar_tld_id: row.registrar_tld_id,
            download_session_id: row.download_session_id,
            old_registration_price: row.old_registration_price,
            new_registration_price: row.new_registration_price,
            old_renewal_price: row.old_renewal_price,
            new_renewal_price: row.new_renewal_price,
            old_transfer_price: row.old_transfer_price,
            new_transfer_price: row.new_transfer_price,
            old_currency: row.old_currency.map(|c| c.trim().to_string()),
            new_currency: row.new_currency.trim().to_string(),
            change_source: row.change_source,
            changed_at: row.changed_at,
        }
    }
}
