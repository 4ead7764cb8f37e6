//! Database service for card-status-service.

use crate::models::StatusRecord;
use service_core::error::AppError;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

/// SQLite connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open the store, creating the database file if it does not exist yet
    /// (the connection URL carries `mode=rwc`).
    #[instrument(skip(database_url), fields(service = "card-status-service"))]
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        info!(max_connections = max_connections, "Opening SQLite store");

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("SQLite store opened");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;

        Ok(())
    }

    /// Run the idempotent schema initialization. Safe to run on every
    /// startup against the same store file.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Merge a normalized record into the store, keeping only the newest
    /// timestamp per card identifier. An incoming record that is not strictly
    /// newer than the stored one is discarded without comment.
    #[instrument(skip(self, record), fields(card_id = %record.card_id))]
    pub async fn merge_record(&self, record: &StatusRecord) -> Result<(), AppError> {
        let existing = sqlx::query_as::<_, StatusRecord>(
            r#"
            SELECT id, card_id, phone, timestamp, status
            FROM card_status
            WHERE card_id = $1
            "#,
        )
        .bind(&record.card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to query existing record: {}", e))
        })?;

        match existing {
            None => self.insert_record(record).await,
            Some(existing) if existing.timestamp < record.timestamp => {
                sqlx::query(
                    r#"
                    DELETE FROM card_status
                    WHERE id = $1
                    "#,
                )
                .bind(&existing.id)
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to delete stale record: {}", e))
                })?;

                self.insert_record(record).await
            }
            Some(_) => Ok(()),
        }
    }

    async fn insert_record(&self, record: &StatusRecord) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO card_status (id, card_id, phone, timestamp, status)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&record.id)
        .bind(&record.card_id)
        .bind(&record.phone)
        .bind(record.timestamp)
        .bind(&record.status)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to insert record: {}", e)))?;

        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    #[instrument(skip(self), fields(card_id = %card_id))]
    pub async fn find_by_card_id(&self, card_id: &str) -> Result<Option<StatusRecord>, AppError> {
        let record = sqlx::query_as::<_, StatusRecord>(
            r#"
            SELECT id, card_id, phone, timestamp, status
            FROM card_status
            WHERE card_id = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get record by card_id: {}", e))
        })?;

        Ok(record)
    }

    #[instrument(skip(self, phone))]
    pub async fn find_by_phone(&self, phone: &str) -> Result<Option<StatusRecord>, AppError> {
        let record = sqlx::query_as::<_, StatusRecord>(
            r#"
            SELECT id, card_id, phone, timestamp, status
            FROM card_status
            WHERE phone = $1
            ORDER BY timestamp DESC
            LIMIT 1
            "#,
        )
        .bind(phone)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to get record by phone: {}", e))
        })?;

        Ok(record)
    }
}
