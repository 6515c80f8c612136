use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Open the configured database and create the schema (`atlas init`).
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;
    pool.close().await;
    Ok(())
}

/// Idempotently create the job table and its claim index.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_jobs (
            analysis_id TEXT PRIMARY KEY,
            subject_id TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('queued', 'running', 'completed', 'failed')),
            documents TEXT NOT NULL,
            options TEXT,
            report TEXT,
            error TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Serves the claim query: queued rows in creation order.
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_analysis_jobs_status ON analysis_jobs(status, created_at)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
