//! Email queue repository implementation
//!
//! Rows move `pending -> sending -> sent | pending | failed`. Claiming uses a
//! conditional update so two workers never send the same email. A claim
//! expires at `next_attempt_at`, after which a `sending` row is due again.

use ispdesk_core::{
    models::{EmailStatus, NewEmail, QueuedEmail},
    traits::EmailQueueRepository,
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use tracing::{debug, error, instrument};

const EMAIL_COLUMNS: &str = r#"
    id, to_address, subject, body_text, body_html, status,
    attempts, max_attempts, next_attempt_at, last_error,
    created_at, sent_at
"#;

/// PostgreSQL implementation of EmailQueueRepository
pub struct PgEmailQueueRepository {
    pool: PgPool,
}

impl PgEmailQueueRepository {
    /// Create a new email queue repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmailQueueRepository for PgEmailQueueRepository {
    #[instrument(skip(self, email), fields(to = %email.to_address))]
    async fn insert(
        &self,
        email: &NewEmail,
        max_attempts: i32,
        now: DateTime<Utc>,
    ) -> AppResult<QueuedEmail> {
        let row = sqlx::query_as::<Postgres, EmailRow>(&format!(
            r#"
            INSERT INTO email_queue (
                to_address, subject, body_text, body_html,
                status, max_attempts, next_attempt_at, created_at
            )
            VALUES ($1, $2, $3, $4, 'pending', $5, $6, $6)
            RETURNING {EMAIL_COLUMNS}
            "#
        ))
        .bind(&email.to_address)
        .bind(&email.subject)
        .bind(&email.body_text)
        .bind(&email.body_html)
        .bind(max_attempts)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error queueing email: {}", e);
            AppError::Database(format!("Failed to queue email: {}", e))
        })?;

        row.try_into()
    }

    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i64) -> AppResult<Option<QueuedEmail>> {
        let row = sqlx::query_as::<Postgres, EmailRow>(&format!(
            "SELECT {EMAIL_COLUMNS} FROM email_queue WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding email {}: {}", id, e);
            AppError::Database(format!("Failed to find email: {}", e))
        })?;

        row.map(QueuedEmail::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_due(&self, now: DateTime<Utc>, limit: i64) -> AppResult<Vec<QueuedEmail>> {
        let rows = sqlx::query_as::<Postgres, EmailRow>(&format!(
            r#"
            SELECT {EMAIL_COLUMNS}
            FROM email_queue
            WHERE status IN ('pending', 'sending') AND next_attempt_at <= $1
            ORDER BY next_attempt_at ASC, id ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding due emails: {}", e);
            AppError::Database(format!("Failed to find due emails: {}", e))
        })?;

        debug!("Found {} due emails", rows.len());
        rows.into_iter().map(QueuedEmail::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn claim(
        &self,
        id: i64,
        now: DateTime<Utc>,
        claimed_until: DateTime<Utc>,
    ) -> AppResult<Option<QueuedEmail>> {
        let row = sqlx::query_as::<Postgres, EmailRow>(&format!(
            r#"
            UPDATE email_queue
            SET status = 'sending', next_attempt_at = $3
            WHERE id = $1
              AND status IN ('pending', 'sending')
              AND next_attempt_at <= $2
            RETURNING {EMAIL_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(now)
        .bind(claimed_until)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error claiming email {}: {}", id, e);
            AppError::Database(format!("Failed to claim email: {}", e))
        })?;

        row.map(QueuedEmail::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_sent(&self, id: i64, sent_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'sent', sent_at = $2, attempts = attempts + 1, last_error = NULL
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(sent_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error marking email {} sent: {}", id, e);
            AppError::Database(format!("Failed to mark email sent: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_retry(
        &self,
        id: i64,
        attempts: i32,
        next_attempt_at: DateTime<Utc>,
        error: &str,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'pending', attempts = $2, next_attempt_at = $3, last_error = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(next_attempt_at)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error rescheduling email {}: {}", id, e);
            AppError::Database(format!("Failed to reschedule email: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self, error))]
    async fn mark_failed(&self, id: i64, attempts: i32, error: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE email_queue
            SET status = 'failed', attempts = $2, last_error = $3
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(attempts)
        .bind(error)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error failing email {}: {}", id, e);
            AppError::Database(format!("Failed to mark email failed: {}", e))
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn count_by_status(&self, status: EmailStatus) -> AppResult<i64> {
        let result: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_queue WHERE status = $1")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                error!("Database error counting emails: {}", e);
                AppError::Database(format!("Failed to count emails: {}", e))
            })?;

        Ok(result.0)
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EmailRow {
    id: i64,
    to_address: String,
    subject: String,
    body_text: String,
    body_html: Option<String>,
    status: String,
    attempts: i32,
    max_attempts: i32,
    next_attempt_at: DateTime<Utc>,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
}

impl TryFrom<EmailRow> for QueuedEmail {
    type Error = AppError;

    fn try_from(row: EmailRow) -> Result<Self, Self::Error> {
        let status = EmailStatus::from_str(&row.status).ok_or_else(|| {
            AppError::Database(format!(
                "Email {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;

        Ok(Self {
            id: row.id,
            to_address: row.to_address,
            subject: row.subject,
            body_text: row.body_text,
            body_html: row.body_html,
            status,
            attempts: row.attempts,
            max_attempts: row.max_attempts,
            next_attempt_at: row.next_attempt_at,
            last_error: row.last_error,
            created_at: row.created_at,
            sent_at: row.sent_at,
        })
    }
}
