//! Completion record repository
//!
//! Appends one record per processed batch to Postgres.

use anyhow::{Context, Result};
use async_trait::async_trait;
use kube_etl_core::domain::record::CompletionRecord;
use sqlx::PgPool;

/// Repository trait for the append-only completion record store
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends a completion record
    async fn append(&self, record: &CompletionRecord) -> Result<()>;
}

/// Postgres implementation of RecordStore
pub struct PgRecordStore {
    pool: PgPool,
}

impl PgRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn append(&self, record: &CompletionRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO ingest_runs (
                id, ingest, ingest_type, load_date, readable_date,
                graph_job_duration_secs, index_job_duration_secs, total_job_duration_secs
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(&record.ingest)
        .bind(record.ingest_type.as_str())
        .bind(record.load_date)
        .bind(&record.readable_date)
        .bind(record.graph_job_duration_secs)
        .bind(record.index_job_duration_secs)
        .bind(record.total_job_duration_secs)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to insert completion record for {}", record.ingest))?;

        Ok(())
    }
}
