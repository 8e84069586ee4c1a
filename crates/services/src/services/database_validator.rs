//! Startup and health checks for the donations schema.

use serde::Serialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{info, warn};
use ts_rs::TS;

pub const REQUIRED_TABLES: [&str; 6] = [
    "users",
    "associations",
    "offers",
    "recipient_offers",
    "messages",
    "access_tokens",
];

#[derive(Debug, Error)]
pub enum DatabaseValidationError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("schema incomplete, missing tables: {0}")]
    MissingTables(String),
}

pub struct DatabaseValidator {
    pool: SqlitePool,
}

/// Outcome of a schema check, also returned by the health endpoint.
#[derive(Debug, Clone, Serialize, TS)]
pub struct SchemaReport {
    pub migrations_applied: usize,
    pub latest_migration: Option<String>,
    pub missing_tables: Vec<String>,
}

impl SchemaReport {
    pub fn is_ok(&self) -> bool {
        self.missing_tables.is_empty()
    }

    pub fn summary(&self) -> String {
        if self.is_ok() {
            format!("Database OK - {} migrations applied", self.migrations_applied)
        } else {
            format!("Missing tables: {}", self.missing_tables.join(", "))
        }
    }
}

impl DatabaseValidator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn report(&self) -> Result<SchemaReport, DatabaseValidationError> {
        let migrations_table = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = '_sqlx_migrations'",
        )
        .fetch_one(&self.pool)
        .await?
            > 0;

        let (migrations_applied, latest_migration) = if migrations_table {
            let applied = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM _sqlx_migrations WHERE success = 1",
            )
            .fetch_one(&self.pool)
            .await?;
            let latest = sqlx::query_scalar::<_, String>(
                "SELECT description FROM _sqlx_migrations WHERE success = 1 ORDER BY version DESC LIMIT 1",
            )
            .fetch_optional(&self.pool)
            .await?;
            (applied as usize, latest)
        } else {
            (0, None)
        };

        Ok(SchemaReport {
            migrations_applied,
            latest_migration,
            missing_tables: self.missing_tables(&REQUIRED_TABLES).await?,
        })
    }

    pub async fn missing_tables(
        &self,
        required: &[&str],
    ) -> Result<Vec<String>, DatabaseValidationError> {
        let mut missing = Vec::new();
        for table in required {
            let exists = sqlx::query_scalar::<_, i64>(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = $1",
            )
            .bind(table)
            .fetch_one(&self.pool)
            .await?
                > 0;
            if !exists {
                missing.push(table.to_string());
            }
        }
        Ok(missing)
    }

    /// Fails when a required table is missing.
    pub async fn validate(&self) -> Result<SchemaReport, DatabaseValidationError> {
        let report = self.report().await?;
        if !report.is_ok() {
            warn!(missing = ?report.missing_tables, "Database schema incomplete");
            return Err(DatabaseValidationError::MissingTables(
                report.missing_tables.join(", "),
            ));
        }
        info!(
            migrations_applied = report.migrations_applied,
            latest = report.latest_migration.as_deref().unwrap_or("none"),
            "Database validation complete"
        );
        Ok(report)
    }
}
