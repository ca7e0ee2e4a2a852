//! PostgreSQL pool bootstrap and template queries.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{debug, info};
use uuid::Uuid;

use crate::bootstrap::DatabaseDriver;
use crate::error::{DependencyError, StoreError};

use super::{NewTemplate, Template, TemplateChanges, TemplateStore};

/// Idempotent schema for the `templates` table. Never alters an existing table.
pub const TEMPLATES_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS templates (
    id UUID PRIMARY KEY,
    title VARCHAR(255) NOT NULL,
    user_id INT NOT NULL,
    created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
    deleted_at TIMESTAMP
)";

const TEMPLATE_COLUMNS: &str = "id, title, user_id, created_at, updated_at, deleted_at";

// =============================================================================
// Driver
// =============================================================================

/// Opens a PostgreSQL pool and ensures the template schema.
#[derive(Debug, Clone)]
pub struct PostgresDriver {
    url: String,
    max_connections: u32,
    acquire_timeout: Duration,
}

impl PostgresDriver {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            max_connections: 10,
            acquire_timeout: Duration::from_secs(30),
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

#[async_trait]
impl DatabaseDriver for PostgresDriver {
    type Handle = PgPool;

    async fn connect(&self) -> Result<PgPool, DependencyError> {
        let pool = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
            .connect(&self.url)
            .await
            .map_err(|e| DependencyError::Connect(e.to_string()))?;

        if let Err(e) = sqlx::query("SELECT 1").execute(&pool).await {
            pool.close().await;
            return Err(DependencyError::Connect(format!("probe query failed: {}", e)));
        }

        debug!(max_connections = self.max_connections, "Database pool opened");
        Ok(pool)
    }

    async fn ensure_schema(&self, pool: &PgPool) -> Result<(), DependencyError> {
        sqlx::query(TEMPLATES_SCHEMA)
            .execute(pool)
            .await
            .map_err(|e| DependencyError::Schema(e.to_string()))?;
        info!("Templates table ready");
        Ok(())
    }

    async fn close(&self, pool: PgPool) {
        pool.close().await;
        debug!("Database pool closed");
    }
}

// =============================================================================
// Template Store
// =============================================================================

/// [`TemplateStore`] over a shared PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgTemplateStore {
    pool: PgPool,
}

impl PgTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PgTemplateStore {
    async fn create(&self, template: &NewTemplate) -> Result<Template, StoreError> {
        let query = format!(
            "INSERT INTO templates (id, title, user_id) VALUES ($1, $2, $3) RETURNING {}",
            TEMPLATE_COLUMNS
        );
        let row = sqlx::query_as::<_, Template>(&query)
            .bind(Uuid::new_v4())
            .bind(&template.title)
            .bind(template.user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(row)
    }

    async fn list_active(&self) -> Result<Vec<Template>, StoreError> {
        let query = format!(
            "SELECT {} FROM templates WHERE deleted_at IS NULL ORDER BY created_at",
            TEMPLATE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Template>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn update(&self, id: Uuid, changes: &TemplateChanges) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE templates
             SET title = COALESCE($2, title),
                 user_id = COALESCE($3, user_id),
                 updated_at = CURRENT_TIMESTAMP
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(changes.title.as_deref())
        .bind(changes.user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE templates SET deleted_at = CURRENT_TIMESTAMP
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}
