//! Registrar and TLD repository implementations

use ispdesk_core::{
    models::{normalize_extension, Registrar, RegistrarTld, Tld},
    traits::{RegistrarRepository, TldRepository},
    AppError, AppResult,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres};
use tracing::{debug, error, instrument};

/// PostgreSQL implementation of RegistrarRepository
pub struct PgRegistrarRepository {
    pool: PgPool,
}

impl PgRegistrarRepository {
    /// Create a new registrar repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RegistrarRepository for PgRegistrarRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Registrar>> {
        debug!("Finding registrar by id: {}", id);

        let row = sqlx::query_as::<Postgres, RegistrarRow>(
            r#"
            SELECT id, code, name, api_url, is_active, created_at, updated_at
            FROM registrars
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding registrar {}: {}", id, e);
            AppError::Database(format!("Failed to find registrar: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_code(&self, code: &str) -> AppResult<Option<Registrar>> {
        let row = sqlx::query_as::<Postgres, RegistrarRow>(
            r#"
            SELECT id, code, name, api_url, is_active, created_at, updated_at
            FROM registrars
            WHERE LOWER(code) = LOWER($1)
            "#,
        )
        .bind(code.trim())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding registrar {}: {}", code, e);
            AppError::Database(format!("Failed to find registrar: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> AppResult<Vec<Registrar>> {
        let rows = sqlx::query_as::<Postgres, RegistrarRow>(
            r#"
            SELECT id, code, name, api_url, is_active, created_at, updated_at
            FROM registrars
            WHERE is_active
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing registrars: {}", e);
            AppError::Database(format!("Failed to list registrars: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// PostgreSQL implementation of TldRepository
pub struct PgTldRepository {
    pool: PgPool,
}

impl PgTldRepository {
    /// Create a new TLD repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TldRepository for PgTldRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: i32) -> AppResult<Option<Tld>> {
        let row = sqlx::query_as::<Postgres, TldRow>(
            r#"
            SELECT id, extension, description, is_active, created_at, updated_at
            FROM tlds
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding tld {}: {}", id, e);
            AppError::Database(format!("Failed to find TLD: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn find_by_extension(&self, extension: &str) -> AppResult<Option<Tld>> {
        let normalized = normalize_extension(extension);
        debug!("Finding tld by extension: {}", normalized);

        let row = sqlx::query_as::<Postgres, TldRow>(
            r#"
            SELECT id, extension, description, is_active, created_at, updated_at
            FROM tlds
            WHERE extension = $1
            "#,
        )
        .bind(&normalized)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding tld {}: {}", normalized, e);
            AppError::Database(format!("Failed to find TLD: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_active(&self) -> AppResult<Vec<Tld>> {
        let rows = sqlx::query_as::<Postgres, TldRow>(
            r#"
            SELECT id, extension, description, is_active, created_at, updated_at
            FROM tlds
            WHERE is_active
            ORDER BY extension
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing tlds: {}", e);
            AppError::Database(format!("Failed to list TLDs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn find_offering(&self, registrar_tld_id: i32) -> AppResult<Option<RegistrarTld>> {
        let row = sqlx::query_as::<Postgres, RegistrarTldRow>(
            r#"
            SELECT rt.id, rt.registrar_id, rt.tld_id, t.extension, rt.is_active
            FROM registrar_tlds rt
            JOIN tlds t ON t.id = rt.tld_id
            WHERE rt.id = $1
            "#,
        )
        .bind(registrar_tld_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error finding registrar_tld {}: {}", registrar_tld_id, e);
            AppError::Database(format!("Failed to find registrar TLD: {}", e))
        })?;

        Ok(row.map(Into::into))
    }

    #[instrument(skip(self))]
    async fn list_offerings_by_registrar(&self, registrar_id: i32) -> AppResult<Vec<RegistrarTld>> {
        let rows = sqlx::query_as::<Postgres, RegistrarTldRow>(
            r#"
            SELECT rt.id, rt.registrar_id, rt.tld_id, t.extension, rt.is_active
            FROM registrar_tlds rt
            JOIN tlds t ON t.id = rt.tld_id
            WHERE rt.registrar_id = $1 AND rt.is_active
            ORDER BY t.extension
            "#,
        )
        .bind(registrar_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Database error listing offerings of registrar {}: {}",
                registrar_id, e
            );
            AppError::Database(format!("Failed to list registrar TLDs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    #[instrument(skip(self))]
    async fn list_offerings_by_tld(&self, tld_id: i32) -> AppResult<Vec<RegistrarTld>> {
        let rows = sqlx::query_as::<Postgres, RegistrarTldRow>(
            r#"
            SELECT rt.id, rt.registrar_id, rt.tld_id, t.extension, rt.is_active
            FROM registrar_tlds rt
            JOIN tlds t ON t.id = rt.tld_id
            WHERE rt.tld_id = $1 AND rt.is_active
            ORDER BY rt.registrar_id
            "#,
        )
        .bind(tld_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("Database error listing offerings of tld {}: {}", tld_id, e);
            AppError::Database(format!("Failed to list registrar TLDs: {}", e))
        })?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegistrarRow {
    id: i32,
    code: String,
    name: String,
    api_url: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<RegistrarRow> for Registrar {
    fn from(row: RegistrarRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            name: row.name,
            api_url: row.api_url,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TldRow {
    id: i32,
    extension: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TldRow> for Tld {
    fn from(row: TldRow) -> Self {
        Self {
            id: row.id,
            extension: row.extension,
            description: row.description,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RegistrarTldRow {
    id: i32,
    registrar_id: i32,
    tld_id: i32,
    extension: String,
    is_active: bool,
}

impl From<RegistrarTldRow> for RegistrarTld {
    fn from(row: RegistrarTldRow) -> Self {
        Self {
            id: row.id,
            registrar_id: row.registrar_id,
            tld_id: row.tld_id,
            extension: row.extension,
            is_active: row.is_active,
        }
    }
}
