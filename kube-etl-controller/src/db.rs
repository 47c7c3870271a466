use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // One row per processed batch
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS ingest_runs (
            id UUID PRIMARY KEY,
            ingest VARCHAR(255) NOT NULL,
            ingest_type VARCHAR(20) NOT NULL,
            load_date TIMESTAMPTZ NOT NULL,
            readable_date VARCHAR(64) NOT NULL,
            graph_job_duration_secs BIGINT NOT NULL,
            index_job_duration_secs BIGINT NOT NULL,
            total_job_duration_secs BIGINT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingest_runs_load_date ON ingest_runs(load_date DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_ingest_runs_ingest ON ingest_runs(ingest)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
